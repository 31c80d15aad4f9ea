//! Test-and-set spin lock with bounded backoff.
//!
//! [`TasLock`] is the pool's coarse region lock. The fast path is a single
//! atomic test-and-set; under contention the acquirer spins a bounded
//! number of pause iterations, yields, and then sleeps with a doubling
//! interval capped at one second.
//!
//! In [`LockingMode::Private`] the lock is a no-op: no atomics on the
//! acquire path. Diagnostic builds assert that a private lock is only ever
//! touched from one thread and never re-entered.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
#[cfg(debug_assertions)]
use std::sync::atomic::AtomicU64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Whether a pool serializes access for parallel threads or trusts the
/// caller to be single-threaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockingMode {
    /// Full mutual exclusion for parallel OS threads.
    #[default]
    Threaded,
    /// Single-threaded operation; locks are no-ops.
    Private,
}

/// Spin iterations before the first yield.
const SPIN_LIMIT: u32 = 64;

/// First sleep interval once spinning and yielding have failed.
const SLEEP_START: Duration = Duration::from_micros(500);

/// Sleep interval cap.
const SLEEP_MAX: Duration = Duration::from_secs(1);

/// A test-and-set mutex protecting a value of type `T`.
///
/// Non-reentrant. Lock order elsewhere in the crate is
/// region lock -> per-frame mutex, never the reverse.
pub struct TasLock<T> {
    flag: AtomicBool,
    mode: LockingMode,
    /// Token of the owning thread; 0 when unowned. Diagnostic builds only.
    #[cfg(debug_assertions)]
    owner: AtomicU64,
    value: UnsafeCell<T>,
}

// The lock provides exclusive access to `value`; the flag (or, in private
// mode, the caller's single-threadedness) guarantees no aliasing.
unsafe impl<T: Send> Send for TasLock<T> {}
unsafe impl<T: Send> Sync for TasLock<T> {}

impl<T> TasLock<T> {
    /// Create a new lock around `value`.
    pub fn new(mode: LockingMode, value: T) -> Self {
        Self {
            flag: AtomicBool::new(false),
            mode,
            #[cfg(debug_assertions)]
            owner: AtomicU64::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, blocking until it is owned by the caller.
    pub fn lock(&self) -> TasGuard<'_, T> {
        match self.mode {
            LockingMode::Private => self.debug_acquire_private(),
            LockingMode::Threaded => {
                #[cfg(debug_assertions)]
                debug_assert_ne!(
                    self.owner.load(Ordering::Relaxed),
                    thread_token(),
                    "relock of a TasLock by its owning thread"
                );

                let mut spins = 0u32;
                let mut sleep = SLEEP_START;
                while !self.try_acquire() {
                    if spins < SPIN_LIMIT {
                        spins += 1;
                        std::hint::spin_loop();
                    } else {
                        std::thread::yield_now();
                        std::thread::sleep(sleep);
                        sleep = (sleep * 2).min(SLEEP_MAX);
                    }
                }
                self.debug_set_owner();
                TasGuard { lock: self }
            }
        }
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        self.flag
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[cfg(debug_assertions)]
    fn debug_acquire_private(&self) -> TasGuard<'_, T> {
        // Private mode: assert never re-entered and never shared across
        // threads. The owner slot doubles as the home-thread record.
        let token = thread_token();
        let prev = self.owner.swap(token, Ordering::Relaxed);
        debug_assert!(
            prev == 0 || prev == token,
            "private-mode TasLock touched from a second thread"
        );
        debug_assert!(
            !self.flag.swap(true, Ordering::Relaxed),
            "private-mode TasLock re-entered"
        );
        TasGuard { lock: self }
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    fn debug_acquire_private(&self) -> TasGuard<'_, T> {
        TasGuard { lock: self }
    }

    #[cfg(debug_assertions)]
    #[inline]
    fn debug_set_owner(&self) {
        self.owner.store(thread_token(), Ordering::Relaxed);
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    fn debug_set_owner(&self) {}

    fn release(&self) {
        match self.mode {
            LockingMode::Private => {
                #[cfg(debug_assertions)]
                self.flag.store(false, Ordering::Relaxed);
            }
            LockingMode::Threaded => {
                #[cfg(debug_assertions)]
                {
                    debug_assert_eq!(
                        self.owner.load(Ordering::Relaxed),
                        thread_token(),
                        "TasLock released by a thread that does not own it"
                    );
                    self.owner.store(0, Ordering::Relaxed);
                }
                self.flag.store(false, Ordering::Release);
            }
        }
    }
}

/// RAII guard for [`TasLock`]; releases the lock on drop.
pub struct TasGuard<'a, T> {
    lock: &'a TasLock<T>,
}

impl<T> Deref for TasGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Exclusive access is guaranteed by the held lock.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for TasGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for TasGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// A small unique token per thread, used for ownership diagnostics.
#[cfg(debug_assertions)]
fn thread_token() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static TOKEN: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    TOKEN.with(|t| *t)
}
