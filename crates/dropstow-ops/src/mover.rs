//! Primitive single-item moves and their reversal.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use dropstow_core::{MoveError, MoveOperation, OperationKind, Result, ensure_not_blank, path_size};

use crate::conflict::auto_rename_path;

/// How to place an item when its name is already taken at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Use a collision-free " (n)" name.
    #[default]
    Unique,
    /// Replace the existing item. It is only removed once the move succeeded.
    Replace,
}

/// Moves one file or folder and moves it back.
///
/// Implementations do blocking filesystem work; the engine calls them from
/// the blocking thread pool.
pub trait PrimitiveMover: Send + Sync {
    /// Move `source` into `destination_folder`, creating the folder if needed.
    fn move_item(
        &self,
        source: &Path,
        destination_folder: &Path,
        placement: Placement,
    ) -> Result<MoveOperation>;

    /// Move the item of a completed operation back to its original path.
    fn undo(&self, operation: &MoveOperation) -> Result<()>;

    /// Remove a source whose content already exists at the destination.
    fn remove_source(&self, source: &Path) -> Result<()>;
}

/// Filesystem mover: rename when possible, copy and delete across devices.
#[derive(Debug, Clone, Default)]
pub struct FsMover {
    /// Whether removed sources go to the trash instead of being deleted.
    pub use_trash: bool,
}

impl FsMover {
    /// Create a mover that deletes removed sources permanently.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mover that sends removed sources to the trash.
    pub fn with_trash() -> Self {
        Self { use_trash: true }
    }
}

impl PrimitiveMover for FsMover {
    fn move_item(
        &self,
        source: &Path,
        destination_folder: &Path,
        placement: Placement,
    ) -> Result<MoveOperation> {
        ensure_not_blank(source, "Source")?;
        ensure_not_blank(destination_folder, "Destination")?;

        let metadata = fs::symlink_metadata(source).map_err(|e| MoveError::io(source, e))?;
        let name = source.file_name().ok_or_else(|| {
            MoveError::validation(format!("{} has no file name", source.display()))
        })?;

        let mut dest = destination_folder.join(name);

        if dest == source {
            return Err(MoveError::conflict(
                &dest,
                "Source and destination are the same file",
            ));
        }
        if dest.starts_with(source) {
            return Err(MoveError::conflict(
                &dest,
                "Cannot move a directory into itself",
            ));
        }

        fs::create_dir_all(destination_folder)
            .map_err(|e| MoveError::io(destination_folder, e))?;

        let size = path_size(source);
        if dest.symlink_metadata().is_ok() {
            match placement {
                Placement::Unique => {
                    dest = auto_rename_path(&dest);
                    relocate(source, &dest)?;
                }
                Placement::Replace => replace_existing(&dest, || relocate(source, &dest))?,
            }
        } else {
            relocate(source, &dest)?;
        }
        debug!(source = %source.display(), dest = %dest.display(), "moved item");

        Ok(MoveOperation::new(source, dest, OperationKind::Move).with_item(metadata.is_dir(), size))
    }

    fn undo(&self, operation: &MoveOperation) -> Result<()> {
        let current = &operation.destination_path;
        let original = &operation.source_path;

        if current.symlink_metadata().is_err() {
            return Err(MoveError::NotFound {
                path: current.clone(),
            });
        }
        if original.symlink_metadata().is_ok() {
            return Err(MoveError::conflict(
                original,
                "Original location is occupied",
            ));
        }

        if let Some(parent) = original.parent() {
            fs::create_dir_all(parent).map_err(|e| MoveError::io(parent, e))?;
        }

        relocate(current, original)?;
        debug!(from = %current.display(), to = %original.display(), "moved item back");
        Ok(())
    }

    fn remove_source(&self, source: &Path) -> Result<()> {
        ensure_not_blank(source, "Source")?;

        if self.use_trash {
            trash::delete(source).map_err(|e| MoveError::Io {
                path: source.to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })
        } else {
            remove_path(source)
        }
    }
}

/// Run blocking filesystem work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(path: &Path, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| MoveError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(format!("Task failed: {e}")),
        })?
}

/// Move a path, falling back to copy and delete across filesystems.
fn relocate(source: &Path, dest: &Path) -> Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {}
        Err(e) => {
            // With the source still present, a missing path is the destination's
            let path = if e.kind() == ErrorKind::NotFound && source.symlink_metadata().is_ok() {
                dest
            } else {
                source
            };
            return Err(MoveError::io(path, e));
        }
    }

    let copied = if source.is_dir() {
        copy_dir_recursive(source, dest)
    } else {
        fs::copy(source, dest)
            .map(|_| ())
            .map_err(|e| MoveError::io(source, e))
    };

    if let Err(e) = copied {
        // Leave no partial copy behind; the source is still intact.
        let _ = remove_path(dest);
        return Err(e);
    }

    remove_path(source)
}

/// Put something new at `dest` while keeping the old item recoverable.
///
/// The existing item is renamed aside, `place` is run, and the aside copy is
/// deleted only if `place` succeeded. Otherwise it is renamed back.
fn replace_existing<F>(dest: &Path, place: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let aside = aside_path(dest);
    fs::rename(dest, &aside).map_err(|e| MoveError::io(dest, e))?;

    if let Err(e) = place() {
        if let Err(restore) = fs::rename(&aside, dest) {
            warn!(
                aside = %aside.display(),
                dest = %dest.display(),
                error = %restore,
                "could not restore replaced item"
            );
        }
        return Err(e);
    }

    if let Err(e) = remove_path(&aside) {
        warn!(aside = %aside.display(), error = %e, "could not remove replaced item");
    }
    Ok(())
}

/// Hidden, unused sibling name for an item being replaced.
fn aside_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let aside = dest.with_file_name(format!(".{name}.replaced"));
    if aside.symlink_metadata().is_ok() {
        auto_rename_path(&aside)
    } else {
        aside
    }
}

/// Remove a file or directory tree.
fn remove_path(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).map_err(|e| MoveError::io(path, e))?;
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| MoveError::io(path, e))
}

/// Recursively copy a directory (for cross-filesystem moves).
fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| MoveError::io(dest, e))?;

    let entries = fs::read_dir(source).map_err(|e| MoveError::io(source, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| MoveError::io(source, e))?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path).map_err(|e| MoveError::io(&path, e))?;
        }
    }

    Ok(())
}
