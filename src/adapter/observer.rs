//! Single-slot failure observer
//!
//! While a callback-style step is in flight it holds the slot. The registration is
//! released exactly once, on the first completion or the first observed failure, so a
//! later step can never inherit an earlier step's observer.

use std::cell::RefCell;

use tracing::{debug, warn};

/// Observer error type
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("failure observer is already held by '{0}'")]
    Occupied(String),
}

/// Holds at most one active registration
#[derive(Debug, Default)]
pub struct ObserverSlot {
    active: RefCell<Option<String>>,
}

impl ObserverSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for the step labelled `owner`
    pub fn install(&self, owner: &str) -> Result<Registration<'_>, ObserverError> {
        let mut active = self.active.borrow_mut();
        if let Some(current) = active.as_ref() {
            warn!(current = %current, requested = %owner, "failure observer already installed");
            return Err(ObserverError::Occupied(current.clone()));
        }
        *active = Some(owner.to_string());
        debug!(owner = %owner, "failure observer installed");
        Ok(Registration {
            slot: self,
            released: false,
        })
    }

    /// Label of the step currently holding the slot
    pub fn holder(&self) -> Option<String> {
        self.active.borrow().clone()
    }

    pub fn is_free(&self) -> bool {
        self.active.borrow().is_none()
    }
}

/// Claim on an [`ObserverSlot`]; frees the slot when released or dropped
#[derive(Debug)]
pub struct Registration<'a> {
    slot: &'a ObserverSlot,
    released: bool,
}

impl Registration<'_> {
    /// Free the slot. Returns `false` if this registration was already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        if let Some(owner) = self.slot.active.borrow_mut().take() {
            debug!(owner = %owner, "failure observer released");
        }
        true
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
