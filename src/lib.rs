//! Scoped deferred actions: a [`Frame`] runs what was registered on it when
//! the scope exits, newest first.

pub mod action;
pub mod binding;
mod defer;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod sites;
pub mod stack;

pub use action::DeferredAction;
pub use binding::Slot;
pub use dispatch::{Disposition, ExitMode};
pub use error::{Failure, FrameError, Unwound};
pub use frame::{Frame, FrameState};
pub use stack::{DeferStack, DrainReport};

use std::panic::{self, AssertUnwindSafe};

pub fn enter_scope<'a, T>() -> Frame<'a, T> {
    Frame::new()
}

pub fn enter_scope_labeled<'a, T>(label: impl Into<String>) -> Frame<'a, T> {
    Frame::with_label(label)
}

/// Runs `body` in a fresh frame whose result is anonymous.
///
/// `Ok(value)` from the body is the return point: `value` is stored before
/// any deferred action runs. `Err` exits the frame as unwinding and comes
/// back as [`FrameError::Unwound`]. A panic in the body drains the frame as
/// unwinding, then keeps propagating with its original payload.
pub fn scope<'a, T, F>(label: &str, body: F) -> Result<T, FrameError>
where
    T: Clone,
    F: FnOnce(&mut Frame<'a, T>) -> anyhow::Result<T>,
{
    let mut frame = Frame::with_label(label);
    match panic::catch_unwind(AssertUnwindSafe(|| body(&mut frame))) {
        Ok(Ok(value)) => {
            frame.return_anonymous(value)?;
            frame.exit_normal()
        }
        Ok(Err(failure)) => Err(frame.exit_unwind(failure).into()),
        Err(payload) => frame.resume_panic(payload),
    }
}

/// Like [`scope`], with a named result starting at `initial`. The caller
/// receives whatever the slot holds after the drain.
pub fn scope_named<'a, T, F>(label: &str, initial: T, body: F) -> Result<T, FrameError>
where
    T: Clone,
    F: FnOnce(&mut Frame<'a, T>, &Slot<T>) -> anyhow::Result<()>,
{
    let mut frame = Frame::with_label(label);
    let slot = frame.bind_named(initial)?;
    match panic::catch_unwind(AssertUnwindSafe(|| body(&mut frame, &slot))) {
        Ok(Ok(())) => {
            if !frame.has_returned() {
                frame.return_named()?;
            }
            frame.exit_normal()
        }
        Ok(Err(failure)) => Err(frame.exit_unwind(failure).into()),
        Err(payload) => frame.resume_panic(payload),
    }
}
