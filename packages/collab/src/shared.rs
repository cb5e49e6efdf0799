//! Store handle shared between the UI thread and the relay tasks.
//!
//! The lock is held only for the duration of a dispatch or a read and never
//! across an await point.

use reactype_editor::Store;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SharedStore = Arc<Mutex<Store>>;

pub fn shared_store(store: Store) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Lock the store. A poisoned lock still yields the last committed state,
/// since dispatch swaps state in only after an action fully applied.
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, Store> {
    lock(store)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
