//! Runtime support for agenda delivery.
//!
//! This module provides the [`Scheduler`] abstraction every agenda is driven
//! on, and the lock helpers the rest of the crate shares.

mod scheduler;

pub use scheduler::{Scheduler, TokioScheduler};

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// A panicking reducer or subscriber poisons the lock it ran under. The
// guarded data is still consistent at that point, so keep going.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
