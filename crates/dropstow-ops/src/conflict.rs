//! Duplicate policies and conflict resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use dropstow_core::DuplicateCheckResult;

/// What to do when a destination already holds the same content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Ask for each duplicate until a decision applies to all.
    #[default]
    Ask,
    /// Leave every duplicate source where it is.
    SkipAll,
    /// Overwrite every duplicate destination.
    ReplaceAll,
    /// Move every duplicate under a new " (n)" name.
    KeepBothAll,
    /// Delete every source whose content is already at the destination.
    DeleteSourceAll,
}

impl DuplicatePolicy {
    /// The action this policy fixes for the whole batch, if any.
    pub fn fixed_action(&self) -> Option<DuplicateAction> {
        match self {
            Self::Ask => None,
            Self::SkipAll => Some(DuplicateAction::Skip),
            Self::ReplaceAll => Some(DuplicateAction::Replace),
            Self::KeepBothAll => Some(DuplicateAction::KeepBoth),
            Self::DeleteSourceAll => Some(DuplicateAction::DeleteSource),
        }
    }
}

/// How a single duplicate is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateAction {
    /// Leave the source in place.
    Skip,
    /// Overwrite the destination.
    Replace,
    /// Move under a collision-free name.
    KeepBoth,
    /// Delete the source, keeping the destination copy.
    DeleteSource,
}

impl std::fmt::Display for DuplicateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skip => write!(f, "Skip"),
            Self::Replace => write!(f, "Replace"),
            Self::KeepBoth => write!(f, "Keep both"),
            Self::DeleteSource => write!(f, "Delete source"),
        }
    }
}

/// An answer to a [`ConflictRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateDecision {
    /// The chosen action.
    pub action: DuplicateAction,
    /// Apply the action to the remaining duplicates of this batch.
    pub apply_to_all: bool,
}

impl DuplicateDecision {
    /// A decision for this item only.
    pub fn once(action: DuplicateAction) -> Self {
        Self {
            action,
            apply_to_all: false,
        }
    }

    /// A decision for this and every later duplicate in the batch.
    pub fn for_all(action: DuplicateAction) -> Self {
        Self {
            action,
            apply_to_all: true,
        }
    }
}

/// A duplicate found while running a batch under the `Ask` policy.
///
/// The batch waits until [`ConflictRequest::respond`] is called. Dropping the
/// request without answering fails that one item.
#[derive(Debug)]
pub struct ConflictRequest {
    /// The source item.
    pub source: PathBuf,
    /// The destination that already holds equivalent content.
    pub destination: PathBuf,
    /// The comparison that found the duplicate.
    pub check: DuplicateCheckResult,
    responder: oneshot::Sender<DuplicateDecision>,
}

impl ConflictRequest {
    /// Create a conflict request with its response channel.
    pub fn new(
        source: PathBuf,
        destination: PathBuf,
        check: DuplicateCheckResult,
        responder: oneshot::Sender<DuplicateDecision>,
    ) -> Self {
        Self {
            source,
            destination,
            check,
            responder,
        }
    }

    /// Send the decision back to the waiting batch.
    ///
    /// Returns false if the batch is no longer waiting.
    pub fn respond(self, decision: DuplicateDecision) -> bool {
        self.responder.send(decision).is_ok()
    }
}

/// Generate an auto-renamed path to avoid conflicts.
///
/// For "file.txt", tries "file (1).txt", "file (2).txt", etc.
pub fn auto_rename_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());

    for i in 1..10_000 {
        let new_name = match &extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };

        let new_path = parent.join(&new_name);
        if new_path.symlink_metadata().is_err() {
            return new_path;
        }
    }

    // Fallback: use timestamp
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    let new_name = match &extension {
        Some(ext) => format!("{stem}_{timestamp}.{ext}"),
        None => format!("{stem}_{timestamp}"),
    };

    parent.join(&new_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_auto_rename_path() {
        let path = PathBuf::from("/tmp/dropstow-no-such-dir/test.txt");
        let renamed = auto_rename_path(&path);
        assert!(renamed.to_string_lossy().ends_with("test (1).txt"));
    }

    #[test]
    fn test_auto_rename_no_extension() {
        let path = PathBuf::from("/tmp/dropstow-no-such-dir/testfile");
        let renamed = auto_rename_path(&path);
        assert!(renamed.to_string_lossy().ends_with("testfile (1)"));
    }

    #[test]
    fn test_auto_rename_skips_taken_names() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "x").unwrap();
        fs::write(temp.path().join("a (1).txt"), "x").unwrap();
        fs::write(temp.path().join("a (2).txt"), "x").unwrap();

        let renamed = auto_rename_path(&temp.path().join("a.txt"));
        assert_eq!(renamed, temp.path().join("a (3).txt"));
    }

    #[test]
    fn test_policy_fixed_action() {
        assert_eq!(DuplicatePolicy::Ask.fixed_action(), None);
        assert_eq!(
            DuplicatePolicy::KeepBothAll.fixed_action(),
            Some(DuplicateAction::KeepBoth)
        );
        assert_eq!(
            DuplicatePolicy::DeleteSourceAll.fixed_action(),
            Some(DuplicateAction::DeleteSource)
        );
    }

    #[test]
    fn test_respond_after_receiver_dropped() {
        let (tx, rx) = oneshot::channel();
        drop(rx);
        let request = ConflictRequest::new(
            PathBuf::from("/a"),
            PathBuf::from("/b"),
            DuplicateCheckResult::hashed(true),
            tx,
        );
        assert!(!request.respond(DuplicateDecision::once(DuplicateAction::Skip)));
    }
}
