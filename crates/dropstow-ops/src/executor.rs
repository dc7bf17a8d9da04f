//! Batch move execution with duplicate handling.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dropstow_analyze::DuplicateDetector;
use dropstow_core::{
    DroppedItem, DuplicateCheckResult, MoveError, MoveOperation, Result, ensure_not_blank,
};

use crate::conflict::{ConflictRequest, DuplicateAction, DuplicateDecision, DuplicatePolicy};
use crate::journal::OperationJournal;
use crate::mover::{Placement, PrimitiveMover, run_blocking};
use crate::operation::{BatchFileGroup, BatchOperationError, BatchOperationResult};
use crate::progress::{BatchEvent, BatchProgress};
use crate::undo_window::{UndoCoordinator, undo_action};
use crate::OPERATION_CHANNEL_SIZE;

/// Default length of the undo window.
const DEFAULT_UNDO_EXPIRATION: Duration = Duration::from_secs(10);

/// What happened to one item.
enum ItemOutcome {
    Moved(MoveOperation),
    Skipped(&'static str),
}

/// Runs batches of moves through the detector, the mover and the journal.
pub struct BatchExecutor {
    detector: Arc<DuplicateDetector>,
    mover: Arc<dyn PrimitiveMover>,
    journal: Arc<OperationJournal>,
    undo: Option<Arc<UndoCoordinator>>,
    undo_expiration: Duration,
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("journal", &self.journal)
            .field("undo_window", &self.undo.is_some())
            .field("undo_expiration", &self.undo_expiration)
            .finish_non_exhaustive()
    }
}

impl BatchExecutor {
    /// Create an executor without an undo window.
    pub fn new(
        detector: Arc<DuplicateDetector>,
        mover: Arc<dyn PrimitiveMover>,
        journal: Arc<OperationJournal>,
    ) -> Self {
        Self {
            detector,
            mover,
            journal,
            undo: None,
            undo_expiration: DEFAULT_UNDO_EXPIRATION,
        }
    }

    /// Register every completed move with an undo window.
    pub fn with_undo_window(
        mut self,
        coordinator: Arc<UndoCoordinator>,
        expiration: Duration,
    ) -> Self {
        self.undo = Some(coordinator);
        self.undo_expiration = expiration;
        self
    }

    /// The journal moves are recorded in.
    pub fn journal(&self) -> &Arc<OperationJournal> {
        &self.journal
    }

    /// The duplicate detector.
    pub fn detector(&self) -> &Arc<DuplicateDetector> {
        &self.detector
    }

    /// Move every item of the selected groups, in order.
    ///
    /// Per-item failures are collected in the result and never stop the
    /// batch. Only a blank destination on a selected group is an error.
    /// Cancellation ends the batch early with `cancelled` set.
    pub async fn execute_batch_move(
        &self,
        groups: &[BatchFileGroup],
        policy: DuplicatePolicy,
        events: &mpsc::Sender<BatchEvent>,
        cancel: &CancellationToken,
    ) -> Result<BatchOperationResult> {
        let selected: Vec<&BatchFileGroup> = groups.iter().filter(|g| g.selected).collect();
        for group in &selected {
            ensure_not_blank(&group.destination, "Destination")?;
        }

        let mut result = BatchOperationResult::for_groups(selected.iter().copied());
        let mut sticky = policy.fixed_action();
        let mut index = 0;

        info!(
            items = result.total_count,
            destinations = result.destination_count,
            ?policy,
            "starting batch move"
        );

        'groups: for group in &selected {
            for item in &group.items {
                if cancel.is_cancelled() {
                    result.cancelled = true;
                    break 'groups;
                }
                index += 1;

                let status = match self
                    .process_item(group, item, &mut sticky, events, cancel)
                    .await
                {
                    Ok(ItemOutcome::Moved(operation)) => {
                        self.finish_move(operation, &mut result).await;
                        format!("Moved to {}", group.display_name)
                    }
                    Ok(ItemOutcome::Skipped(reason)) => {
                        debug!(item = %item.name, reason, "skipped item");
                        result.add_skipped();
                        reason.to_string()
                    }
                    Err(e) if e.is_cancelled() => {
                        result.cancelled = true;
                        break 'groups;
                    }
                    Err(e) => {
                        warn!(item = %item.path.display(), error = %e, "item failed");
                        result.add_failure(BatchOperationError::new(item, &e));
                        format!("Failed: {e}")
                    }
                };

                let progress = BatchProgress::new(index, result.total_count, &item.name, status);
                // Best effort: a full or unread channel must not stall the batch
                let _ = events.try_send(BatchEvent::Progress(progress));
            }
        }

        info!(summary = %result.summary(), "batch move finished");
        Ok(result)
    }

    async fn process_item(
        &self,
        group: &BatchFileGroup,
        item: &DroppedItem,
        sticky: &mut Option<DuplicateAction>,
        events: &mpsc::Sender<BatchEvent>,
        cancel: &CancellationToken,
    ) -> Result<ItemOutcome> {
        let destination = group.destination.join(&item.name);

        let check = self
            .detector
            .check_for_duplicate(&item.path, &destination, cancel)
            .await?;
        if let Some(message) = &check.error {
            return Err(check_error(&item.path, message));
        }

        let mut placement = Placement::Unique;
        if check.is_duplicate {
            let action = match *sticky {
                Some(action) => action,
                None => {
                    let decision = ask(item, &destination, check.clone(), events, cancel).await?;
                    if decision.apply_to_all {
                        *sticky = Some(decision.action);
                    }
                    decision.action
                }
            };
            debug!(
                item = %item.name,
                method = %check.comparison_method,
                exact = check.is_exact_match,
                %action,
                "resolving duplicate"
            );

            match action {
                DuplicateAction::Skip => return Ok(ItemOutcome::Skipped("Skipped duplicate")),
                DuplicateAction::Replace => placement = Placement::Replace,
                DuplicateAction::KeepBoth => {}
                DuplicateAction::DeleteSource if check.is_exact_match => {
                    let mover = Arc::clone(&self.mover);
                    let source = item.path.clone();
                    run_blocking(&item.path, move || mover.remove_source(&source)).await?;
                    return Ok(ItemOutcome::Skipped("Removed duplicate source"));
                }
                // Not provably identical: keep both copies.
                DuplicateAction::DeleteSource => {}
            }
        }

        let mover = Arc::clone(&self.mover);
        let source = item.path.clone();
        let folder = group.destination.clone();
        let operation =
            run_blocking(&item.path, move || mover.move_item(&source, &folder, placement)).await?;

        Ok(ItemOutcome::Moved(operation.with_confidence(group.confidence)))
    }

    /// Journal a completed move and offer it for one-click undo.
    async fn finish_move(&self, operation: MoveOperation, result: &mut BatchOperationResult) {
        let recorded = match self.journal.record_operation(operation.clone()).await {
            Ok(recorded) => recorded,
            Err(e) => {
                warn!(item = %operation.item_name, error = %e, "could not journal move");
                result.add_success(operation);
                return;
            }
        };

        if let Some(coordinator) = &self.undo {
            let journal = Arc::clone(&self.journal);
            let id = recorded.id;
            coordinator.register(
                recorded.description(),
                undo_action(move || async move { journal.undo(id).await.map(|_| ()) }),
                self.undo_expiration,
            );
        }

        result.add_success(recorded);
    }
}

/// Ask the event receiver how to resolve a duplicate.
async fn ask(
    item: &DroppedItem,
    destination: &Path,
    check: DuplicateCheckResult,
    events: &mpsc::Sender<BatchEvent>,
    cancel: &CancellationToken,
) -> Result<DuplicateDecision> {
    let (tx, rx) = oneshot::channel();
    let request = ConflictRequest::new(item.path.clone(), destination.to_path_buf(), check, tx);

    if events.send(BatchEvent::Conflict(request)).await.is_err() {
        return Err(MoveError::conflict(
            destination,
            "No receiver for duplicate decisions",
        ));
    }

    tokio::select! {
        decision = rx => decision.map_err(|_| {
            MoveError::conflict(destination, "Duplicate decision was never given")
        }),
        _ = cancel.cancelled() => Err(MoveError::Cancelled),
    }
}

/// Turn a failed comparison into an item error.
fn check_error(source: &Path, message: &str) -> MoveError {
    if source.symlink_metadata().is_err() {
        MoveError::NotFound {
            path: source.to_path_buf(),
        }
    } else {
        MoveError::Io {
            path: source.to_path_buf(),
            source: std::io::Error::other(message.to_string()),
        }
    }
}

/// Run a batch in the background.
///
/// The receiver gets progress and conflict events and finally
/// [`BatchEvent::Complete`]. A rejected batch completes with every selected
/// item failed.
pub fn start_batch_move(
    executor: Arc<BatchExecutor>,
    groups: Vec<BatchFileGroup>,
    policy: DuplicatePolicy,
    cancel: CancellationToken,
) -> mpsc::Receiver<BatchEvent> {
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::spawn(async move {
        let result = match executor
            .execute_batch_move(&groups, policy, &tx, &cancel)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "batch rejected");
                rejected(&groups, &e)
            }
        };
        let _ = tx.send(BatchEvent::Complete(result)).await;
    });

    rx
}

fn rejected(groups: &[BatchFileGroup], error: &MoveError) -> BatchOperationResult {
    let selected: Vec<&BatchFileGroup> = groups.iter().filter(|g| g.selected).collect();
    let mut result = BatchOperationResult::for_groups(selected.iter().copied());
    for item in selected.iter().flat_map(|g| g.items.iter()) {
        result.add_failure(BatchOperationError::new(item, error));
    }
    result
}
