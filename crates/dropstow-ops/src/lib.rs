//! Batch move engine for dropstow.
//!
//! This crate plans and executes batches of moves with duplicate handling,
//! keeps a durable journal of every move, and offers a short one-click undo
//! window. Progress and duplicate prompts are delivered over channels, the
//! same way for a single batch call and for a spawned batch.

mod conflict;
mod executor;
mod journal;
mod mover;
mod operation;
mod planner;
mod progress;
mod undo_window;

use std::future::Future;
use std::pin::Pin;

pub use conflict::{
    ConflictRequest, DuplicateAction, DuplicateDecision, DuplicatePolicy, auto_rename_path,
};
pub use executor::{BatchExecutor, start_batch_move};
pub use journal::{JOURNAL_VERSION, OperationJournal, UndoSummary};
pub use mover::{FsMover, Placement, PrimitiveMover};
pub use operation::{BatchFileGroup, BatchOperationError, BatchOperationResult};
pub use planner::{
    BatchPlanner, CachedResolver, CategoryResolver, FixedResolver, Suggestion, SuggestionResolver,
};
pub use progress::{BatchEvent, BatchProgress};
pub use undo_window::{
    UndoAction, UndoAvailable, UndoCoordinator, UndoEvent, UndoReport, undo_action,
};

/// Default channel buffer size for batch events.
pub const OPERATION_CHANNEL_SIZE: usize = 100;

/// Type alias for boxed futures returned by collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
