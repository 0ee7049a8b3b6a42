use crate::action::DeferredAction;
use crate::error::Failure;

/// Outcome of one drain.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub executed: usize,
    /// Failures in the order they happened, i.e. newest registration first.
    pub failures: Vec<Failure>,
}

/// Pending deferred actions of a single frame, in registration order.
#[derive(Debug, Default)]
pub struct DeferStack<'a> {
    entries: Vec<DeferredAction<'a>>,
    registered: usize,
}

impl<'a> DeferStack<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `action` and returns its sequence number. Every call costs one
    /// entry, even when the same cleanup is registered over and over.
    pub fn register(&mut self, mut action: DeferredAction<'a>) -> usize {
        let seq = self.registered;
        action.set_seq(seq);
        self.registered += 1;
        self.entries.push(action);
        seq
    }

    /// Runs the entries present right now, newest first, each exactly once.
    /// A failing entry is recorded and the drain moves on to the next one.
    pub fn drain(&mut self) -> DrainReport {
        let snapshot = std::mem::take(&mut self.entries);
        let mut report = DrainReport::default();

        for action in snapshot.into_iter().rev() {
            report.executed += 1;
            if let Err(failure) = action.run() {
                log::warn!("{failure}; continuing drain");
                report.failures.push(failure);
            }
        }
        report
    }

    /// Drops every pending entry without running it.
    pub fn discard(&mut self) -> usize {
        let discarded = self.entries.len();
        self.entries.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of registrations over the stack's lifetime.
    pub fn registered(&self) -> usize {
        self.registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn drains_newest_first() {
        let order = RefCell::new(Vec::new());
        let mut stack = DeferStack::new();
        for name in ["a", "b", "c"] {
            stack.register(DeferredAction::with_args(name, |name| {
                order.borrow_mut().push(name)
            }));
        }

        let report = stack.drain();

        assert_eq!(report.executed, 3);
        assert!(report.failures.is_empty());
        assert_eq!(*order.borrow(), ["c", "b", "a"]);
    }

    #[test]
    fn keeps_draining_after_failures() {
        let ran = RefCell::new(Vec::new());
        let mut stack = DeferStack::new();
        stack.register(DeferredAction::new(|| ran.borrow_mut().push(0)));
        stack.register(DeferredAction::fallible(|| anyhow::bail!("close failed")));
        stack.register(DeferredAction::new(|| panic!("release exploded")));
        stack.register(DeferredAction::new(|| ran.borrow_mut().push(3)));

        let report = stack.drain();

        assert_eq!(report.executed, 4);
        assert_eq!(*ran.borrow(), [3, 0]);
        let seqs: Vec<_> = report.failures.iter().filter_map(Failure::seq).collect();
        assert_eq!(seqs, [2, 1]);
        assert!(matches!(
            &report.failures[0],
            Failure::ActionPanic { message, .. } if message == "release exploded"
        ));
    }

    #[test]
    fn second_drain_is_a_no_op() {
        let count = RefCell::new(0);
        let mut stack = DeferStack::new();
        stack.register(DeferredAction::new(|| *count.borrow_mut() += 1));
        stack.register(DeferredAction::new(|| *count.borrow_mut() += 1));

        assert_eq!(stack.drain().executed, 2);
        assert_eq!(stack.drain().executed, 0);
        assert_eq!(*count.borrow(), 2);
        assert_eq!(stack.registered(), 2);
    }

    #[test]
    fn discard_runs_nothing() {
        let ran = RefCell::new(false);
        let mut stack = DeferStack::new();
        stack.register(DeferredAction::new(|| *ran.borrow_mut() = true));

        assert_eq!(stack.discard(), 1);
        assert!(stack.is_empty());
        assert_eq!(stack.drain().executed, 0);
        assert!(!*ran.borrow());
    }
}
