//! Batch operations
//!
//! An operation is a closed description of one mutation, applied to a
//! target when its batch executes. Operations are consumed by `apply`,
//! so each one runs at most once.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A target shared between its owner and any batches that mutate it.
///
/// Batches only keep a weak reference; the owner decides its lifetime.
pub type SharedTarget<T> = Arc<Mutex<T>>;

/// Wrap a value as a [`SharedTarget`]
pub fn shared<T>(target: T) -> SharedTarget<T> {
    Arc::new(Mutex::new(target))
}

/// One deferred mutation of a `T`
pub trait BatchOperation<T> {
    /// Error raised when the mutation fails
    type Error;

    /// Short identifier used in logs and failure reports
    fn name(&self) -> &str;

    /// Apply the mutation, consuming the operation
    fn apply(self, target: &mut T) -> Result<(), Self::Error>;
}

/// An operation backed by a closure, for mutations that do not warrant
/// their own enum variant
pub struct FnOperation<T, E> {
    name: String,
    func: Box<dyn FnOnce(&mut T) -> Result<(), E>>,
}

impl<T, E> FnOperation<T, E> {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnOnce(&mut T) -> Result<(), E> + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl<T, E> fmt::Debug for FnOperation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation").field("name", &self.name).finish()
    }
}

impl<T, E> BatchOperation<T> for FnOperation<T, E> {
    type Error = E;

    fn name(&self) -> &str {
        &self.name
    }

    fn apply(self, target: &mut T) -> Result<(), E> {
        (self.func)(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_operation_applies_closure() {
        let op: FnOperation<Vec<u32>, String> = FnOperation::new("push", |v: &mut Vec<u32>| {
            v.push(3);
            Ok(())
        });
        assert_eq!(op.name(), "push");

        let mut target = vec![1, 2];
        op.apply(&mut target).unwrap();
        assert_eq!(target, vec![1, 2, 3]);
    }

    #[test]
    fn test_fn_operation_propagates_error() {
        let op: FnOperation<u32, String> = FnOperation::new("fail", |_| Err("nope".to_string()));
        let mut target = 0;
        assert_eq!(op.apply(&mut target), Err("nope".to_string()));
    }

    #[test]
    fn test_shared_target() {
        let target = shared(5u8);
        *target.lock() += 1;
        assert_eq!(*target.lock(), 6);
    }
}
