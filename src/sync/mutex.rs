//! Mutex and condvar wrappers - use parking_lot if available, std otherwise.
//!
//! Both backends expose the same by-value `Condvar::wait` so callers never
//! branch on the feature.

#[cfg(feature = "parking_lot")]
pub use parking_lot::Mutex;

#[cfg(feature = "parking_lot")]
mod pl_condvar {
    use parking_lot::MutexGuard;

    /// Condition variable backed by `parking_lot::Condvar`.
    #[derive(Default)]
    pub struct Condvar(parking_lot::Condvar);

    impl Condvar {
        /// Create a new condition variable.
        pub const fn new() -> Self {
            Self(parking_lot::Condvar::new())
        }

        /// Block until notified, re-acquiring the lock before returning.
        pub fn wait<'a, T>(&self, mut guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
            self.0.wait(&mut guard);
            guard
        }

        /// Wake one waiter.
        pub fn notify_one(&self) {
            self.0.notify_one();
        }
    }
}

#[cfg(feature = "parking_lot")]
pub use pl_condvar::Condvar;

#[cfg(not(feature = "parking_lot"))]
mod std_mutex {
    use std::sync::{Condvar as StdCondvar, Mutex as StdMutex, MutexGuard as StdMutexGuard};

    /// Thin wrapper around std::sync::Mutex.
    ///
    /// Poisoning is ignored: task panics are caught before they can unwind
    /// through a held guard, so a poisoned lock still holds consistent data.
    #[derive(Default)]
    pub struct Mutex<T>(StdMutex<T>);

    impl<T> Mutex<T> {
        /// Create a new mutex.
        pub const fn new(value: T) -> Self {
            Self(StdMutex::new(value))
        }

        /// Lock the mutex.
        pub fn lock(&self) -> MutexGuard<'_, T> {
            MutexGuard(self.0.lock().unwrap_or_else(|e| e.into_inner()))
        }
    }

    /// Guard for std mutex.
    pub struct MutexGuard<'a, T>(StdMutexGuard<'a, T>);

    impl<'a, T> std::ops::Deref for MutexGuard<'a, T> {
        type Target = T;

        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }

    impl<'a, T> std::ops::DerefMut for MutexGuard<'a, T> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.0
        }
    }

    /// Thin wrapper around std::sync::Condvar.
    #[derive(Default)]
    pub struct Condvar(StdCondvar);

    impl Condvar {
        /// Create a new condition variable.
        pub const fn new() -> Self {
            Self(StdCondvar::new())
        }

        /// Block until notified, re-acquiring the lock before returning.
        pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
            MutexGuard(self.0.wait(guard.0).unwrap_or_else(|e| e.into_inner()))
        }

        /// Wake one waiter.
        pub fn notify_one(&self) {
            self.0.notify_one();
        }
    }
}

#[cfg(not(feature = "parking_lot"))]
pub use std_mutex::{Condvar, Mutex};
