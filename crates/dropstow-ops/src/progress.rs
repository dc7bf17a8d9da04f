//! Progress reporting types for batch moves.

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictRequest;
use crate::operation::BatchOperationResult;

/// Progress information for a running batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// One-based index of the item just processed.
    pub current_index: usize,
    /// Total number of items in the selected groups.
    pub total_items: usize,
    /// Name of the item just processed.
    pub current_item: String,
    /// What happened to it.
    pub status_text: String,
}

impl BatchProgress {
    /// Create a progress record.
    pub fn new(
        current_index: usize,
        total_items: usize,
        current_item: impl Into<String>,
        status_text: impl Into<String>,
    ) -> Self {
        Self {
            current_index,
            total_items,
            current_item: current_item.into(),
            status_text: status_text.into(),
        }
    }

    /// Get the progress as a whole percentage (0 to 100).
    pub fn percent(&self) -> usize {
        if self.total_items == 0 {
            0
        } else {
            self.current_index * 100 / self.total_items
        }
    }
}

/// Event sent through the channel while a batch runs.
#[derive(Debug)]
pub enum BatchEvent {
    /// Progress update.
    Progress(BatchProgress),
    /// A duplicate needs a decision.
    Conflict(ConflictRequest),
    /// The batch completed.
    Complete(BatchOperationResult),
}
