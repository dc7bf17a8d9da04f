//! Durable, capped journal of executed operations.
//!
//! The whole document is rewritten after every mutation, and the in-memory
//! state only changes once that write succeeded. A single async mutex guards
//! both the in-memory list and the backing file, so there is only ever one
//! writer.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use dropstow_core::{
    DroppedItem, MoveError, OperationHistoryItem, OperationKind, Result, ensure_not_blank,
};

use crate::mover::{PrimitiveMover, run_blocking};

/// Schema version written to the journal document.
pub const JOURNAL_VERSION: u32 = 1;

/// The persisted journal document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalDocument {
    version: u32,
    max_items: usize,
    /// Next ID to hand out. Kept so IDs are never reused after `clear`.
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    items: Vec<OperationHistoryItem>,
}

#[derive(Debug, Clone)]
struct JournalState {
    items: VecDeque<OperationHistoryItem>,
    next_id: u64,
}

/// Outcome of undoing several journal entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoSummary {
    /// Entries moved back.
    pub succeeded: usize,
    /// Entries that could not be undone.
    pub failed: usize,
    /// (id, message) for every failure.
    pub errors: Vec<(u64, String)>,
}

impl UndoSummary {
    /// Whether every requested entry was undone.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Journal of executed operations with selective and bulk undo.
pub struct OperationJournal {
    path: Option<PathBuf>,
    max_items: usize,
    mover: Arc<dyn PrimitiveMover>,
    state: Mutex<JournalState>,
}

impl std::fmt::Debug for OperationJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationJournal")
            .field("path", &self.path)
            .field("max_items", &self.max_items)
            .finish_non_exhaustive()
    }
}

impl OperationJournal {
    /// Open the journal stored at `path`, loading existing entries.
    ///
    /// A missing file starts an empty journal. An unreadable or corrupt file
    /// is an error rather than being silently replaced.
    pub async fn open(
        path: impl Into<PathBuf>,
        max_items: usize,
        mover: Arc<dyn PrimitiveMover>,
    ) -> Result<Self> {
        let path = path.into();
        ensure_not_blank(&path, "Journal")?;

        let read_path = path.clone();
        let document = run_blocking(&path, move || read_document(&read_path)).await?;

        let (stored_next_id, mut items): (u64, VecDeque<OperationHistoryItem>) = document
            .map(|doc| (doc.next_id, doc.items.into_iter().collect()))
            .unwrap_or_default();
        let max_items = max_items.max(1);
        while items.len() > max_items {
            items.pop_front();
        }

        info!(path = %path.display(), entries = items.len(), "opened operation journal");

        Ok(Self::with_items(Some(path), max_items, mover, items, stored_next_id))
    }

    /// Create a journal that is never written to disk.
    pub fn in_memory(max_items: usize, mover: Arc<dyn PrimitiveMover>) -> Self {
        Self::with_items(None, max_items.max(1), mover, VecDeque::new(), 0)
    }

    fn with_items(
        path: Option<PathBuf>,
        max_items: usize,
        mover: Arc<dyn PrimitiveMover>,
        items: VecDeque<OperationHistoryItem>,
        stored_next_id: u64,
    ) -> Self {
        // Documents written before the high-water mark existed only have their items
        let from_items = items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        let next_id = stored_next_id.max(from_items);
        Self {
            path,
            max_items,
            mover,
            state: Mutex::new(JournalState { items, next_id }),
        }
    }

    /// Location of the backing document, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Maximum number of entries kept.
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Record a move that has already happened on disk.
    pub async fn record(
        &self,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        operation_type: OperationKind,
        confidence: Option<f32>,
    ) -> Result<OperationHistoryItem> {
        let source = source.into();
        let destination = destination.into();
        ensure_not_blank(&source, "Source")?;
        ensure_not_blank(&destination, "Destination")?;

        let stat_path = destination.clone();
        let item = run_blocking(&destination, move || DroppedItem::from_path(stat_path)).await?;

        let operation = OperationHistoryItem::new(source, destination, operation_type)
            .with_item(item.is_directory, item.size)
            .with_confidence(confidence);

        self.record_operation(operation).await
    }

    /// Record an operation produced by a mover, assigning it a journal ID.
    pub async fn record_operation(
        &self,
        mut operation: OperationHistoryItem,
    ) -> Result<OperationHistoryItem> {
        let mut state = self.state.lock().await;

        let mut next = state.clone();
        operation.id = next.next_id;
        next.next_id += 1;
        next.items.push_back(operation.clone());

        // Remove oldest entries beyond capacity
        while next.items.len() > self.max_items {
            next.items.pop_front();
        }

        self.persist(&next).await?;
        *state = next;
        debug!(id = operation.id, "recorded operation");
        Ok(operation)
    }

    /// Mark an entry as failed. Unknown IDs are ignored.
    ///
    /// Returns whether an entry was updated.
    pub async fn mark_failed(&self, id: u64, message: impl Into<String>) -> Result<bool> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let Some(entry) = next.items.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };

        entry.mark_failed(message);
        self.persist(&next).await?;
        *state = next;
        Ok(true)
    }

    /// Move the item of a successful entry back to where it came from.
    pub async fn undo(&self, id: u64) -> Result<OperationHistoryItem> {
        let mut state = self.state.lock().await;

        let index = state
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| MoveError::validation(format!("No history entry with id {id}")))?;

        let operation = state.items[index].clone();
        if !operation.can_undo() {
            return Err(MoveError::validation(format!(
                "Operation {id} is {} and cannot be undone",
                operation.status
            )));
        }
        if operation.destination_path.symlink_metadata().is_err() {
            return Err(MoveError::NotFound {
                path: operation.destination_path.clone(),
            });
        }

        let mover = Arc::clone(&self.mover);
        let target = operation.clone();
        run_blocking(&operation.destination_path, move || mover.undo(&target)).await?;

        // The item is back in place, so the entry is undone whether or not
        // the journal can be written.
        state.items[index].mark_undone();
        let updated = state.items[index].clone();
        if let Err(e) = self.persist(&state).await {
            warn!(id, error = %e, "could not persist undo");
        }

        info!(id, item = %updated.item_name, "undid operation");
        Ok(updated)
    }

    /// Undo several entries independently.
    pub async fn undo_multiple(&self, ids: &[u64]) -> UndoSummary {
        let mut summary = UndoSummary::default();

        for &id in ids {
            match self.undo(id).await {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    warn!(id, error = %e, "undo failed");
                    summary.failed += 1;
                    summary.errors.push((id, e.to_string()));
                }
            }
        }

        summary
    }

    /// Get an entry by ID.
    pub async fn get(&self, id: u64) -> Option<OperationHistoryItem> {
        let state = self.state.lock().await;
        state.items.iter().find(|i| i.id == id).cloned()
    }

    /// All entries, oldest first.
    pub async fn items(&self) -> Vec<OperationHistoryItem> {
        let state = self.state.lock().await;
        state.items.iter().cloned().collect()
    }

    /// The most recent `count` entries, newest first.
    pub async fn recent(&self, count: usize) -> Vec<OperationHistoryItem> {
        let state = self.state.lock().await;
        state.items.iter().rev().take(count).cloned().collect()
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    /// Whether the journal is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }

    /// Remove every entry.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let next = JournalState {
            items: VecDeque::new(),
            next_id: state.next_id,
        };
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    /// Rewrite the whole document. Called with the state lock held.
    async fn persist(&self, state: &JournalState) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        let document = JournalDocument {
            version: JOURNAL_VERSION,
            max_items: self.max_items,
            next_id: state.next_id,
            items: state.items.iter().cloned().collect(),
        };

        let write_path = path.clone();
        run_blocking(&path, move || write_document(&write_path, &document)).await
    }
}

/// Read the journal document, or `None` if it does not exist yet.
fn read_document(path: &Path) -> Result<Option<JournalDocument>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MoveError::io(path, e)),
    };

    let document: JournalDocument = serde_json::from_str(&content)
        .map_err(|e| MoveError::store(format!("Cannot parse {}: {e}", path.display())))?;

    if document.version > JOURNAL_VERSION {
        return Err(MoveError::store(format!(
            "{} was written by a newer version (schema {})",
            path.display(),
            document.version
        )));
    }

    Ok(Some(document))
}

/// Write the journal document through a temporary file.
fn write_document(path: &Path, document: &JournalDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MoveError::io(parent, e))?;
    }

    let content = serde_json::to_vec_pretty(document)
        .map_err(|e| MoveError::store(format!("Cannot serialize journal: {e}")))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content).map_err(|e| MoveError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| MoveError::io(path, e))
}
