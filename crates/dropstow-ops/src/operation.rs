//! Batch plan and result types.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use dropstow_core::{DroppedItem, FileCategory, MoveError, MoveOperation};

/// A group of dropped items that share a category, extension and destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFileGroup {
    /// Category shared by the members.
    pub category: FileCategory,
    /// Extension shared by the members (empty for none).
    pub extension: String,
    /// Folder the members will be moved into.
    pub destination: PathBuf,
    /// Name shown for the destination.
    pub display_name: String,
    /// Items in this group, in drop order.
    pub items: Vec<DroppedItem>,
    /// Whether the group takes part in the batch.
    pub selected: bool,
    /// Confidence reported by the resolver for the destination.
    pub confidence: Option<f32>,
}

impl BatchFileGroup {
    /// Create a selected group.
    pub fn new(
        category: FileCategory,
        extension: impl Into<String>,
        destination: impl Into<PathBuf>,
        items: Vec<DroppedItem>,
    ) -> Self {
        let destination = destination.into();
        let display_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| destination.display().to_string());

        Self {
            category,
            extension: extension.into(),
            destination,
            display_name,
            items,
            selected: true,
            confidence: None,
        }
    }

    /// Set the destination confidence.
    pub fn with_confidence(mut self, confidence: Option<f32>) -> Self {
        self.confidence = confidence;
        self
    }

    /// Number of items in the group.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the group has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total size of the group's items.
    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|i| i.size).sum()
    }
}

/// An error that occurred for one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOperationError {
    /// The item that failed.
    pub path: PathBuf,
    /// The item's name.
    pub item_name: String,
    /// A human-readable error message.
    pub message: String,
    /// Short error kind label (io, not-found, conflict, ...).
    pub kind: String,
}

impl BatchOperationError {
    /// Create an error for an item.
    pub fn new(item: &DroppedItem, error: &MoveError) -> Self {
        Self {
            path: item.path.clone(),
            item_name: item.name.clone(),
            message: error.to_string(),
            kind: error.kind_label().to_string(),
        }
    }
}

impl std::fmt::Display for BatchOperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.item_name, self.message)
    }
}

/// Aggregated outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOperationResult {
    /// Items in the selected groups.
    pub total_count: usize,
    /// Items moved.
    pub success_count: usize,
    /// Items that failed.
    pub failed_count: usize,
    /// Items skipped, including sources removed as exact duplicates.
    pub skipped_count: usize,
    /// Distinct destination folders in the selected groups.
    pub destination_count: usize,
    /// Per-item errors.
    pub errors: Vec<BatchOperationError>,
    /// Completed moves in execution order.
    pub operations: Vec<MoveOperation>,
    /// Whether the batch stopped early because it was cancelled.
    pub cancelled: bool,
}

impl BatchOperationResult {
    /// Create an empty result for the selected groups.
    pub fn for_groups<'a>(groups: impl IntoIterator<Item = &'a BatchFileGroup>) -> Self {
        let mut total_count = 0;
        let mut destinations = HashSet::new();
        for group in groups {
            total_count += group.items.len();
            destinations.insert(group.destination.clone());
        }

        Self {
            total_count,
            destination_count: destinations.len(),
            ..Default::default()
        }
    }

    /// Record a completed move.
    pub fn add_success(&mut self, operation: MoveOperation) {
        self.success_count += 1;
        self.operations.push(operation);
    }

    /// Record a failed item.
    pub fn add_failure(&mut self, error: BatchOperationError) {
        self.failed_count += 1;
        self.errors.push(error);
    }

    /// Record a skipped item.
    pub fn add_skipped(&mut self) {
        self.skipped_count += 1;
    }

    /// Every item succeeded.
    pub fn is_full_success(&self) -> bool {
        self.success_count == self.total_count && self.failed_count == 0
    }

    /// Every item failed.
    pub fn is_full_failure(&self) -> bool {
        self.failed_count == self.total_count && self.success_count == 0
    }

    /// Check if the batch has any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Bytes moved by the batch.
    pub fn bytes_moved(&self) -> u64 {
        self.operations.iter().map(|op| op.size_bytes).sum()
    }

    /// Get a human-readable summary of the batch.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} succeeded, {} failed, {} skipped",
            self.success_count, self.failed_count, self.skipped_count
        );
        if self.cancelled {
            summary.push_str(" (cancelled)");
        }
        summary
    }
}
