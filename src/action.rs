use crate::error::Failure;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

type Work<'a> = Box<dyn FnOnce() -> anyhow::Result<()> + 'a>;

/// A unit of work waiting for its frame to exit.
///
/// Whatever the work needs is captured when the action is built: values moved
/// into the closure (or handed over through [`DeferredAction::with_args`]) are
/// fixed at that moment. Only state reached through a shared handle such as
/// [`Slot`](crate::Slot) or a borrowed cell can still change before it runs.
pub struct DeferredAction<'a> {
    seq: usize,
    work: Work<'a>,
}

impl<'a> DeferredAction<'a> {
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() + 'a,
    {
        Self::fallible(move || {
            work();
            Ok(())
        })
    }

    pub fn fallible<F>(work: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + 'a,
    {
        Self {
            seq: 0,
            work: Box::new(work),
        }
    }

    /// Moves `args` into the action now; `work` receives them when it runs.
    pub fn with_args<A, F>(args: A, work: F) -> Self
    where
        A: 'a,
        F: FnOnce(A) + 'a,
    {
        Self::new(move || work(args))
    }

    /// Position in the registration order of the owning stack.
    pub fn seq(&self) -> usize {
        self.seq
    }

    pub(crate) fn set_seq(&mut self, seq: usize) {
        self.seq = seq;
    }

    /// Runs the work. A panic inside it is caught and reported as a failure
    /// so the rest of the drain still happens.
    pub(crate) fn run(self) -> Result<(), Failure> {
        let seq = self.seq;
        match panic::catch_unwind(AssertUnwindSafe(self.work)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(cause)) => Err(Failure::Action { seq, cause }),
            Err(payload) => Err(Failure::ActionPanic {
                seq,
                message: panic_message(&*payload),
            }),
        }
    }
}

impl fmt::Debug for DeferredAction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAction")
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
