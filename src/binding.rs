use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A shared, mutable storage slot.
///
/// Cloning a `Slot` clones the handle, not the value: every clone reads and
/// writes the same storage. This is how a deferred action gets a live view of
/// a binding instead of a snapshot, and how a named result is shared between
/// the scope body, its deferred actions and the frame.
pub struct Slot<T>(Rc<RefCell<T>>);

impl<T> Slot<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    pub fn replace(&self, value: T) -> T {
        self.0.replace(value)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }
}

impl<T: Clone> Slot<T> {
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }

    /// Takes the value out if this is the last handle, otherwise clones it.
    pub fn into_inner(self) -> T {
        match Rc::try_unwrap(self.0) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => shared.borrow().clone(),
        }
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Default> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&self.0.borrow()).finish()
    }
}

/// Where a frame keeps its result until the caller reads it.
///
/// `Anonymous` owns a copy taken at the return point, so nothing a deferred
/// action does afterwards can reach it. `Named` shares its slot with the body
/// and the deferred actions; the caller gets whatever the slot holds once the
/// drain is over.
pub(crate) enum ResultBinding<T> {
    Unbound,
    Anonymous(T),
    Named { slot: Slot<T>, returned: bool },
    Finalized,
}

impl<T> ResultBinding<T> {
    pub(crate) fn bind_anonymous(&mut self, value: T) -> Result<(), &'static str> {
        match self {
            ResultBinding::Unbound => {
                *self = ResultBinding::Anonymous(value);
                Ok(())
            }
            ResultBinding::Anonymous(_) => Err("result already returned"),
            ResultBinding::Named { .. } => {
                Err("frame has a named result; return through return_named")
            }
            ResultBinding::Finalized => Err("result already finalized"),
        }
    }

    pub(crate) fn bind_named(&mut self, initial: T) -> Result<Slot<T>, &'static str>
    where
        T: Clone,
    {
        match self {
            ResultBinding::Unbound => {
                let slot = Slot::new(initial);
                *self = ResultBinding::Named {
                    slot: slot.clone(),
                    returned: false,
                };
                Ok(slot)
            }
            ResultBinding::Anonymous(_) => Err("result already returned"),
            ResultBinding::Named { .. } => Err("named result already bound"),
            ResultBinding::Finalized => Err("result already finalized"),
        }
    }

    /// Marks the return point. The slot already holds the value, nothing is copied.
    pub(crate) fn return_named(&mut self) -> Result<(), &'static str> {
        match self {
            ResultBinding::Named { returned, .. } => {
                if *returned {
                    return Err("result already returned");
                }
                *returned = true;
                Ok(())
            }
            ResultBinding::Unbound | ResultBinding::Anonymous(_) => {
                Err("frame has no named result")
            }
            ResultBinding::Finalized => Err("result already finalized"),
        }
    }

    /// Stores `value` in the named slot, then marks the return point.
    pub(crate) fn return_named_with(&mut self, value: T) -> Result<(), &'static str> {
        match self {
            ResultBinding::Named { slot, returned, .. } => {
                if *returned {
                    return Err("result already returned");
                }
                slot.set(value);
                *returned = true;
                Ok(())
            }
            ResultBinding::Unbound | ResultBinding::Anonymous(_) => {
                Err("frame has no named result")
            }
            ResultBinding::Finalized => Err("result already finalized"),
        }
    }

    pub(crate) fn has_returned(&self) -> bool {
        match self {
            ResultBinding::Anonymous(_) => true,
            ResultBinding::Named { returned, .. } => *returned,
            ResultBinding::Unbound | ResultBinding::Finalized => false,
        }
    }

    /// The caller's only read. `None` when no return point was reached.
    pub(crate) fn finalize(&mut self) -> Option<T>
    where
        T: Clone,
    {
        match std::mem::replace(self, ResultBinding::Finalized) {
            ResultBinding::Anonymous(value) => Some(value),
            ResultBinding::Named {
                slot,
                returned: true,
            } => Some(slot.into_inner()),
            _ => None,
        }
    }
}
