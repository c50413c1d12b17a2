//! Shared helpers: tracing bootstrap, retry policies, lock recovery.

pub mod bootstrap;
pub mod retry;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a previous holder panicked.
///
/// Registries guarded this way are never left mid-update: callbacks always
/// run after the guard is dropped.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
