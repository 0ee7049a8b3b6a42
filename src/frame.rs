use crate::action::{DeferredAction, panic_message};
use crate::binding::{ResultBinding, Slot};
use crate::dispatch::{Disposition, ExitMode};
use crate::error::{Failure, FrameError, Unwound};
use crate::stack::DeferStack;
use std::any::Any;
use std::fmt;
use std::panic;

const ANONYMOUS_LABEL: &str = "<anonymous>";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Active,
    Draining,
    Drained,
    Finalized,
    Unwound,
    Discarded,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameState::Active => "active",
            FrameState::Draining => "draining",
            FrameState::Drained => "drained",
            FrameState::Finalized => "finalized",
            FrameState::Unwound => "unwound",
            FrameState::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// One logical scope: its pending deferred actions and its result.
///
/// A frame is left through exactly one of [`Frame::exit_normal`],
/// [`Frame::exit_unwind`] or [`Frame::exit_abrupt`]. Each consumes the frame.
/// A frame that is simply dropped (an early `?` return, or a panic passing
/// through the Rust scope that owns it) still drains, as a normal or an
/// unwinding exit depending on whether the thread is panicking; failures found
/// on that path cannot reach anyone and are logged instead. That includes an
/// action panicking while the thread is already unwinding: it is caught like
/// any other action panic and the drain goes on.
///
/// Actions may borrow anything that outlives the frame (`'a`); values moved
/// into them are fixed at registration.
pub struct Frame<'a, T> {
    label: String,
    stack: DeferStack<'a>,
    result: ResultBinding<T>,
    failures: Vec<Failure>,
    state: FrameState,
}

impl<'a, T> Frame<'a, T> {
    pub fn new() -> Self {
        Self::with_label(ANONYMOUS_LABEL)
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        let label = label.into();
        log::trace!("enter frame `{label}`");
        Self {
            label,
            stack: DeferStack::new(),
            result: ResultBinding::Unbound,
            failures: Vec::new(),
            state: FrameState::Active,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.stack.len()
    }

    /// Counts drained registrations too.
    pub fn registered(&self) -> usize {
        self.stack.registered()
    }

    pub fn has_returned(&self) -> bool {
        self.result.has_returned()
    }

    pub fn defer<F>(&mut self, work: F) -> Result<(), FrameError>
    where
        F: FnOnce() + 'a,
    {
        self.register(DeferredAction::new(work))
    }

    /// Registers work that can fail. An `Err` is recorded, the drain goes on,
    /// and the frame then exits as unwinding.
    pub fn defer_fallible<F>(&mut self, work: F) -> Result<(), FrameError>
    where
        F: FnOnce() -> anyhow::Result<()> + 'a,
    {
        self.register(DeferredAction::fallible(work))
    }

    /// Registers `work` with `args` evaluated and moved in right now.
    pub fn defer_with<A, F>(&mut self, args: A, work: F) -> Result<(), FrameError>
    where
        A: 'a,
        F: FnOnce(A) + 'a,
    {
        self.register(DeferredAction::with_args(args, work))
    }

    pub fn register(&mut self, action: DeferredAction<'a>) -> Result<(), FrameError> {
        if self.state != FrameState::Active {
            return Err(FrameError::RegistrationMisuse {
                frame: self.label.clone(),
                state: self.state,
            });
        }
        let seq = self.stack.register(action);
        log::trace!(
            "frame `{}`: registered deferred action #{seq}, {} pending",
            self.label,
            self.stack.len()
        );
        Ok(())
    }

    /// Copies `value` into the result storage. Later changes to whatever
    /// `value` was computed from do not reach the caller.
    pub fn return_anonymous(&mut self, value: T) -> Result<(), FrameError> {
        self.ensure_returnable()?;
        self.result
            .bind_anonymous(value)
            .map_err(|reason| self.result_misuse(reason))
    }

    /// Makes the result a named slot starting at `initial`. The body and its
    /// deferred actions share the returned handle; the caller receives its
    /// value as it stands after the drain.
    pub fn bind_named(&mut self, initial: T) -> Result<Slot<T>, FrameError>
    where
        T: Clone,
    {
        self.ensure_returnable()?;
        self.result
            .bind_named(initial)
            .map_err(|reason| self.result_misuse(reason))
    }

    pub fn return_named(&mut self) -> Result<(), FrameError> {
        self.ensure_returnable()?;
        self.result
            .return_named()
            .map_err(|reason| self.result_misuse(reason))
    }

    /// Stores `value` in the named slot and returns. Deferred actions still
    /// see and may change it.
    pub fn return_named_with(&mut self, value: T) -> Result<(), FrameError> {
        self.ensure_returnable()?;
        self.result
            .return_named_with(value)
            .map_err(|reason| self.result_misuse(reason))
    }

    /// Runs the pending actions, newest first, and returns how many ran.
    /// Only the first call does anything; after it the frame accepts no more
    /// registrations.
    pub fn drain(&mut self) -> usize {
        if self.state != FrameState::Active {
            return 0;
        }
        self.state = FrameState::Draining;
        log::debug!(
            "frame `{}`: draining {} deferred action(s)",
            self.label,
            self.stack.len()
        );
        let report = self.stack.drain();
        self.failures.extend(report.failures);
        self.state = FrameState::Drained;
        report.executed
    }

    /// Leaves the frame through its return point: drain, then hand over the
    /// result. If any action failed the exit turns into an unwinding one and
    /// the result is dropped.
    pub fn exit_normal(mut self) -> Result<T, FrameError>
    where
        T: Clone,
    {
        self.terminate(ExitMode::Normal);

        let failures = std::mem::take(&mut self.failures);
        if let Some(unwound) = Unwound::from_failures(&self.label, failures) {
            self.state = FrameState::Unwound;
            return Err(unwound.into());
        }

        match self.result.finalize() {
            Some(value) => {
                self.state = FrameState::Finalized;
                log::trace!("frame `{}`: finalized", self.label);
                Ok(value)
            }
            None => {
                self.state = FrameState::Unwound;
                Err(FrameError::MissingResult {
                    frame: self.label.clone(),
                })
            }
        }
    }

    /// Leaves the frame because `failure` is propagating. Every pending
    /// action runs first; the returned [`Unwound`] is meant to be passed on
    /// to the enclosing frame.
    pub fn exit_unwind(mut self, failure: impl Into<anyhow::Error>) -> Unwound {
        let body = Failure::Body(failure.into());
        let before = self.failures.len();

        self.terminate(ExitMode::Unwinding);
        self.state = FrameState::Unwound;

        let mut earlier = std::mem::take(&mut self.failures);
        let mut later = earlier.split_off(before);
        let label = self.label.clone();
        match later.pop() {
            Some(last) => {
                earlier.push(body);
                earlier.append(&mut later);
                Unwound::new(label, earlier, last)
            }
            None => Unwound::new(label, earlier, body),
        }
    }

    /// Terminates the process with `code`. Nothing pending runs: not in this
    /// frame, and not in any enclosing frame, since no destructor below this
    /// call executes either. Callers relying on deferred releases must not
    /// take this path.
    pub fn exit_abrupt(mut self, code: i32) -> ! {
        self.terminate(ExitMode::AbruptExit);
        std::process::exit(code)
    }

    /// Drains as unwinding, then resumes the panic carried by `payload`.
    pub(crate) fn resume_panic(mut self, payload: Box<dyn Any + Send>) -> ! {
        log::debug!(
            "frame `{}`: body panicked: {}",
            self.label,
            panic_message(&*payload)
        );
        self.terminate(ExitMode::Unwinding);
        self.report_lost_failures();
        self.state = FrameState::Unwound;
        panic::resume_unwind(payload)
    }

    fn terminate(&mut self, mode: ExitMode) {
        match mode.disposition() {
            Disposition::Drain => {
                self.drain();
            }
            Disposition::Discard => {
                let discarded = self.stack.discard();
                log::warn!(
                    "frame `{}`: {mode}, skipping {discarded} pending deferred action(s)",
                    self.label
                );
                self.state = FrameState::Discarded;
            }
        }
    }

    fn report_lost_failures(&mut self) {
        for failure in self.failures.drain(..) {
            log::error!("frame `{}`: {failure}", self.label);
        }
    }

    fn ensure_returnable(&self) -> Result<(), FrameError> {
        if self.state == FrameState::Active {
            Ok(())
        } else {
            Err(self.result_misuse("frame already drained"))
        }
    }

    fn result_misuse(&self, reason: &'static str) -> FrameError {
        FrameError::ResultMisuse {
            frame: self.label.clone(),
            reason,
        }
    }
}

impl<T> Default for Frame<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Frame<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("pending", &self.stack.len())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for Frame<'_, T> {
    fn drop(&mut self) {
        if !matches!(self.state, FrameState::Active | FrameState::Drained) {
            return;
        }
        let mode = ExitMode::implicit();
        log::debug!(
            "frame `{}` dropped without an explicit exit, treating it as {mode}",
            self.label
        );
        self.terminate(mode);
        self.report_lost_failures();
        self.state = match mode {
            ExitMode::Normal => FrameState::Finalized,
            _ => FrameState::Unwound,
        };
    }
}
