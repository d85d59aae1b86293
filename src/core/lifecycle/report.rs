//! Outcome of emptying the trash.

use crate::error::LifecycleError;

/// A trashed record that could not be purged
#[derive(Debug)]
pub struct PurgeFailure {
    pub trash_id: String,
    pub error: LifecycleError,
}

/// Result of `empty_trash`
#[derive(Debug, Default)]
pub struct EmptyTrashReport {
    /// Records whose hosted copies and index entry are gone
    pub destroyed: usize,
    /// Records left in the trash, with why
    pub failures: Vec<PurgeFailure>,
}

impl EmptyTrashReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
