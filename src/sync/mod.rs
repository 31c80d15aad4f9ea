//! Thread primitives.
//!
//! - [`TasLock`] - test-and-set spin lock with bounded backoff
//! - [`LockingMode`] - threaded vs. private (single-threaded) operation

mod spinlock;

pub use spinlock::{LockingMode, TasGuard, TasLock};
