//! # Move-only transfers
//!
//! A `Transfer` is an owned object that crosses the channel by move instead of
//! by copy: a large buffer, a file handle, anything `Send`. Transfers ride in the
//! envelope next to the frame, never inside the `Value` payload.
//!
//! A `TransferSet` is the staging area for one outgoing message. It replaces a
//! process-wide queue: each invocation or response owns its own set, so staged
//! objects cannot leak into an unrelated message.
//!
//! ## Invariants
//! - `drain_and_reset` hands out the staged objects exactly once and leaves the
//!   set empty. It takes `&mut self`, so nothing can stage in between.
//! - Stage only what the message that carries the set actually refers to.

use std::any::Any;

/// One object moved across the channel.
pub struct Transfer {
    type_name: &'static str,
    inner: Box<dyn Any + Send>,
}

impl Transfer {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Box::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Recovers the moved object, or gives the transfer back if the type is wrong.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Transfer> {
        let type_name = self.type_name;
        self.inner
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|inner| Transfer { type_name, inner })
    }
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Transfer").field(&self.type_name).finish()
    }
}

/// Ordered staging area for the transfers of a single message.
#[derive(Debug, Default)]
pub struct TransferSet {
    staged: Vec<Transfer>,
}

impl TransferSet {
    pub fn new() -> Self {
        Self { staged: Vec::new() }
    }

    /// Marks `value` to be moved with the next message built from this set.
    pub fn stage<T: Any + Send>(&mut self, value: T) -> &mut Self {
        self.staged.push(Transfer::new(value));
        self
    }

    /// Builder-style `stage`.
    pub fn with<T: Any + Send>(mut self, value: T) -> Self {
        self.stage(value);
        self
    }

    /// Returns everything staged so far and leaves the set empty.
    pub fn drain_and_reset(&mut self) -> Vec<Transfer> {
        std::mem::take(&mut self.staged)
    }

    /// Removes and returns the first staged object of type `T`.
    pub fn take<T: Any>(&mut self) -> Option<T> {
        let idx = self.staged.iter().position(|t| t.is::<T>())?;
        self.staged.remove(idx).downcast::<T>().ok()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transfer> {
        self.staged.iter()
    }
}

impl From<Vec<Transfer>> for TransferSet {
    fn from(staged: Vec<Transfer>) -> Self {
        Self { staged }
    }
}
