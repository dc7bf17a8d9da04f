//! Dropped item types.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::error::{MoveError, Result, ensure_not_blank};

/// Broad category of a dropped item, derived from its extension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
pub enum FileCategory {
    Documents,
    Images,
    Videos,
    Audio,
    Archives,
    Code,
    Folders,
    Other,
}

impl FileCategory {
    /// Categorize a lower-case extension without the leading dot.
    pub fn from_extension(extension: &str) -> Self {
        match extension {
            "pdf" | "doc" | "docx" | "odt" | "rtf" | "txt" | "md" | "xls" | "xlsx" | "ods"
            | "csv" | "ppt" | "pptx" | "odp" | "epub" | "pages" | "numbers" | "key" => {
                Self::Documents
            }
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "webp" | "svg" | "heic"
            | "heif" | "raw" | "cr2" | "nef" | "ico" => Self::Images,
            "mp4" | "mkv" | "mov" | "avi" | "wmv" | "webm" | "m4v" | "flv" | "mpg" | "mpeg" => {
                Self::Videos
            }
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" | "wma" | "opus" | "aiff" => Self::Audio,
            "zip" | "rar" | "7z" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "zst" | "dmg" | "iso" => {
                Self::Archives
            }
            "rs" | "py" | "js" | "ts" | "jsx" | "tsx" | "c" | "h" | "cpp" | "hpp" | "cs" | "java"
            | "go" | "rb" | "php" | "swift" | "kt" | "sh" | "ps1" | "json" | "toml" | "yaml"
            | "yml" | "xml" | "html" | "css" | "sql" => Self::Code,
            _ => Self::Other,
        }
    }

    /// Default folder name for this category.
    pub fn folder_name(&self) -> String {
        self.to_string()
    }
}

/// An item dropped onto the engine for relocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedItem {
    /// Full source path.
    pub path: PathBuf,
    /// File or folder name.
    pub name: String,
    /// Lower-case extension without the dot; empty for none and for folders.
    pub extension: String,
    /// Whether the item is a directory.
    pub is_directory: bool,
    /// Size in bytes (recursive for directories).
    pub size: u64,
    /// Category used for grouping.
    pub category: FileCategory,
}

impl DroppedItem {
    /// Build an item from known values, deriving name, extension and category.
    pub fn new(path: impl Into<PathBuf>, is_directory: bool, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = if is_directory {
            String::new()
        } else {
            extension_of(&path)
        };
        let category = if is_directory {
            FileCategory::Folders
        } else {
            FileCategory::from_extension(&extension)
        };

        Self {
            path,
            name,
            extension,
            is_directory,
            size,
            category,
        }
    }

    /// Stat a path on disk and build an item for it.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        ensure_not_blank(&path, "Source")?;

        let metadata = std::fs::symlink_metadata(&path).map_err(|e| MoveError::io(&path, e))?;
        let is_directory = metadata.is_dir();
        let size = if is_directory {
            directory_size(&path)
        } else {
            metadata.len()
        };

        Ok(Self::new(path, is_directory, size))
    }

    /// Override the category chosen from the extension.
    pub fn with_category(mut self, category: FileCategory) -> Self {
        self.category = category;
        self
    }
}

/// Lower-case extension of a path, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Size of a file, or the total size of all files below a directory.
///
/// Unreadable paths count as zero.
pub fn path_size(path: &Path) -> u64 {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => directory_size(path),
        Ok(metadata) => metadata.len(),
        Err(_) => 0,
    }
}

/// Total size of all files below a directory.
fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .skip_hidden(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
