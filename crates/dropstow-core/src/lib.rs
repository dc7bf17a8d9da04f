//! Core types for dropstow.
//!
//! This crate provides the data model shared by the duplicate detector and the
//! move engine: dropped items, comparison results, journal entries, the error
//! taxonomy and the engine configuration.

mod cache;
mod comparison;
mod config;
mod error;
mod history;
mod item;

pub use cache::Expiring;
pub use comparison::{ComparisonMethod, ContentHash, DuplicateCheckResult, FileComparisonInfo};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{MoveError, Result, ensure_not_blank};
pub use history::{MoveOperation, OperationHistoryItem, OperationKind, OperationStatus};
pub use item::{DroppedItem, FileCategory, path_size};
