pub(crate) use std_lock::*;

mod std_lock {
    use std::sync::RwLock as StdRwLock;
    pub(crate) use std::sync::{RwLockReadGuard, RwLockWriteGuard};

    /// A wrapper around [`std::sync::RwLock`].
    #[derive(Debug)]
    pub(crate) struct RwLock<T> {
        inner: StdRwLock<T>,
    }

    impl<T> RwLock<T> {
        /// Creates a new lock in an unlocked state ready for use.
        pub(crate) fn new(data: T) -> Self {
            Self {
                inner: StdRwLock::new(data),
            }
        }

        /// Locks for shared reading, blocking until that is possible.
        ///
        /// This will return `None` in the case the lock is poisoned.
        #[inline]
        pub(crate) fn read(&self) -> Option<RwLockReadGuard<'_, T>> {
            self.inner.read().ok()
        }

        /// Locks for exclusive writing, blocking until that is possible.
        ///
        /// This will return `None` in the case the lock is poisoned.
        #[inline]
        pub(crate) fn write(&self) -> Option<RwLockWriteGuard<'_, T>> {
            self.inner.write().ok()
        }
    }
}
