//! Duplicate detection for dropstow.
//!
//! Decides whether a destination path already holds content equivalent to a
//! source file, using the cheapest comparison that can settle the question:
//!
//! 1. Missing destination: no duplicate, nothing read
//! 2. Different sizes: no duplicate, nothing hashed
//! 3. Either file above the hash ceiling: size plus modification date
//! 4. Otherwise: streamed SHA-256 of both files
//!
//! ```rust,ignore
//! use dropstow_analyze::DuplicateDetector;
//! use tokio_util::sync::CancellationToken;
//!
//! let detector = DuplicateDetector::new();
//! let cancel = CancellationToken::new();
//! let result = detector
//!     .check_for_duplicate("in/a.txt".as_ref(), "out/a.txt".as_ref(), &cancel)
//!     .await?;
//!
//! if result.is_exact_match {
//!     println!("Destination already has this file");
//! }
//! ```

mod duplicates;

pub use duplicates::{DuplicateConfig, DuplicateConfigBuilder, DuplicateDetector};

// Re-export core types
pub use dropstow_core::{ComparisonMethod, ContentHash, DuplicateCheckResult, FileComparisonInfo};
