//! Journal entry types.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of operation that was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationKind {
    #[default]
    Move,
    Copy,
    Rename,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Move => write!(f, "Move"),
            Self::Copy => write!(f, "Copy"),
            Self::Rename => write!(f, "Rename"),
        }
    }
}

/// Lifecycle state of a journaled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Undone,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
            Self::Undone => write!(f, "undone"),
        }
    }
}

/// A single executed operation, as kept in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationHistoryItem {
    /// Unique ID for this entry.
    pub id: u64,
    /// Where the item was before the operation.
    pub source_path: PathBuf,
    /// Where the item ended up.
    pub destination_path: PathBuf,
    /// File or folder name at the destination.
    pub item_name: String,
    /// Whether the item is a directory.
    pub is_directory: bool,
    /// Size in bytes.
    pub size_bytes: u64,
    /// What was done.
    pub operation_type: OperationKind,
    /// Current status.
    pub status: OperationStatus,
    /// When the operation was performed.
    pub timestamp: DateTime<Utc>,
    /// When the operation was undone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undone_at: Option<DateTime<Utc>>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Confidence of the suggestion that chose the destination (0.0 to 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// A completed move, as returned by a mover and carried in batch results.
pub type MoveOperation = OperationHistoryItem;

impl OperationHistoryItem {
    /// Create a successful operation entry. The ID is assigned by the journal.
    pub fn new(
        source_path: impl Into<PathBuf>,
        destination_path: impl Into<PathBuf>,
        operation_type: OperationKind,
    ) -> Self {
        let destination_path = destination_path.into();
        let item_name = destination_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            id: 0,
            source_path: source_path.into(),
            destination_path,
            item_name,
            is_directory: false,
            size_bytes: 0,
            operation_type,
            status: OperationStatus::Success,
            timestamp: Utc::now(),
            undone_at: None,
            error_message: None,
            confidence: None,
        }
    }

    /// Set directory flag and size.
    pub fn with_item(mut self, is_directory: bool, size_bytes: u64) -> Self {
        self.is_directory = is_directory;
        self.size_bytes = size_bytes;
        self
    }

    /// Set the suggestion confidence, clamped to 0.0..=1.0.
    pub fn with_confidence(mut self, confidence: Option<f32>) -> Self {
        self.confidence = confidence.map(|c| c.clamp(0.0, 1.0));
        self
    }

    /// Whether this operation can currently be undone according to its status.
    pub fn can_undo(&self) -> bool {
        self.status == OperationStatus::Success
    }

    /// Mark the operation as undone.
    pub fn mark_undone(&mut self) {
        self.status = OperationStatus::Undone;
        self.undone_at = Some(Utc::now());
    }

    /// Mark the operation as failed with a message.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = OperationStatus::Failed;
        self.error_message = Some(message.into());
    }

    /// Folder that received the item.
    pub fn destination_folder(&self) -> Option<&Path> {
        self.destination_path.parent()
    }

    /// Human-readable description of the operation.
    pub fn description(&self) -> String {
        let folder = self
            .destination_folder()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{} '{}' to {}", self.operation_type, self.item_name, folder)
    }
}
