use crate::frame::FrameState;

/// Something that went wrong while a frame was exiting.
#[derive(thiserror::Error, Debug)]
pub enum Failure {
    #[error("scope body failed: {0:#}")]
    Body(anyhow::Error),
    #[error("deferred action #{seq} failed: {cause:#}")]
    Action { seq: usize, cause: anyhow::Error },
    #[error("deferred action #{seq} panicked: {message}")]
    ActionPanic { seq: usize, message: String },
}

impl Failure {
    /// Registration sequence number of the failing action, if an action failed.
    pub fn seq(&self) -> Option<usize> {
        match self {
            Failure::Body(_) => None,
            Failure::Action { seq, .. } | Failure::ActionPanic { seq, .. } => Some(*seq),
        }
    }
}

/// A frame left through the unwinding path.
///
/// The most recently encountered failure is the primary one. Everything
/// encountered before it stays available through [`Unwound::suppressed`],
/// oldest first.
#[derive(thiserror::Error, Debug)]
#[error("frame `{frame}` unwound: {primary}")]
pub struct Unwound {
    frame: String,
    primary: Failure,
    suppressed: Vec<Failure>,
}

impl Unwound {
    pub(crate) fn new(frame: String, suppressed: Vec<Failure>, primary: Failure) -> Self {
        Self {
            frame,
            primary,
            suppressed,
        }
    }

    pub(crate) fn from_failures(frame: &str, mut failures: Vec<Failure>) -> Option<Self> {
        let primary = failures.pop()?;
        Some(Self::new(frame.to_owned(), failures, primary))
    }

    pub fn frame(&self) -> &str {
        &self.frame
    }

    pub fn primary(&self) -> &Failure {
        &self.primary
    }

    pub fn suppressed(&self) -> &[Failure] {
        &self.suppressed
    }

    /// All failures in the order they were encountered; the primary one is last.
    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.suppressed.iter().chain(std::iter::once(&self.primary))
    }

    pub fn into_primary(self) -> Failure {
        self.primary
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("cannot register a deferred action on frame `{frame}` in state {state}")]
    RegistrationMisuse { frame: String, state: FrameState },
    #[error("frame `{frame}`: {reason}")]
    ResultMisuse { frame: String, reason: &'static str },
    #[error("frame `{frame}` exited normally without a return point")]
    MissingResult { frame: String },
    #[error(transparent)]
    Unwound(#[from] Unwound),
}

impl FrameError {
    pub fn as_unwound(&self) -> Option<&Unwound> {
        match self {
            FrameError::Unwound(unwound) => Some(unwound),
            _ => None,
        }
    }
}
