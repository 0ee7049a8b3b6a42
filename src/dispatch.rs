//! How a frame is leaving, and what that means for its pending actions.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitMode {
    /// The body reached a return point.
    Normal,
    /// A failure is propagating out of the scope.
    Unwinding,
    /// The whole process is terminating right now.
    AbruptExit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Drain,
    Discard,
}

impl ExitMode {
    /// Normal and unwinding exits both run every pending action. An abrupt
    /// exit runs none, in this frame or any other.
    pub fn disposition(self) -> Disposition {
        match self {
            ExitMode::Normal | ExitMode::Unwinding => Disposition::Drain,
            ExitMode::AbruptExit => Disposition::Discard,
        }
    }

    /// Mode for a frame dropped without an explicit exit.
    pub(crate) fn implicit() -> Self {
        if std::thread::panicking() {
            ExitMode::Unwinding
        } else {
            ExitMode::Normal
        }
    }
}

impl fmt::Display for ExitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitMode::Normal => "normal",
            ExitMode::Unwinding => "unwinding",
            ExitMode::AbruptExit => "abrupt exit",
        };
        f.write_str(name)
    }
}
