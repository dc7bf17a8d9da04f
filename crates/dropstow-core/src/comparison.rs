//! File comparison types for duplicate detection.

use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// SHA-256 content hash for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a lower-case hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// How two files were compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonMethod {
    /// No comparison was performed.
    #[default]
    None,
    /// Sizes differed, nothing else was read.
    SizeOnly,
    /// Sizes matched and modification times were compared.
    SizeAndDate,
    /// Full content hashes were compared.
    Hash,
}

impl std::fmt::Display for ComparisonMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::SizeOnly => write!(f, "size"),
            Self::SizeAndDate => write!(f, "size and date"),
            Self::Hash => write!(f, "SHA-256"),
        }
    }
}

/// Metadata gathered about one side of a comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileComparisonInfo {
    /// Path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Content hash, only present when the file was hashed.
    pub hash: Option<ContentHash>,
}

impl FileComparisonInfo {
    /// Create comparison info without a hash.
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
            hash: None,
        }
    }

    /// Read comparison info from the filesystem.
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(Self::new(path, metadata.len(), modified))
    }

    /// Attach a content hash.
    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }
}

/// Outcome of comparing a source file against a destination path.
///
/// `is_exact_match` implies `is_duplicate`. The constructors are the only way
/// the detector builds results, which keeps that invariant in one place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateCheckResult {
    /// Whether the destination holds equivalent content.
    pub is_duplicate: bool,
    /// Whether the content was proven byte-identical.
    pub is_exact_match: bool,
    /// How the comparison was made.
    pub comparison_method: ComparisonMethod,
    /// Source file information, when it could be read.
    pub source: Option<FileComparisonInfo>,
    /// Destination file information, when it exists.
    pub destination: Option<FileComparisonInfo>,
    /// Error message when the check could not be completed.
    pub error: Option<String>,
}

impl DuplicateCheckResult {
    /// No duplicate, with the given method.
    pub fn no_duplicate(method: ComparisonMethod) -> Self {
        Self {
            comparison_method: method,
            ..Default::default()
        }
    }

    /// A likely duplicate decided by size and modification date.
    pub fn probable_duplicate() -> Self {
        Self {
            is_duplicate: true,
            is_exact_match: false,
            comparison_method: ComparisonMethod::SizeAndDate,
            ..Default::default()
        }
    }

    /// Result of a hash comparison.
    pub fn hashed(equal: bool) -> Self {
        Self {
            is_duplicate: equal,
            is_exact_match: equal,
            comparison_method: ComparisonMethod::Hash,
            ..Default::default()
        }
    }

    /// A check that could not be completed.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Attach source and destination information.
    pub fn with_files(
        mut self,
        source: Option<FileComparisonInfo>,
        destination: Option<FileComparisonInfo>,
    ) -> Self {
        self.source = source;
        self.destination = destination;
        self
    }

    /// Whether the check completed without error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_hex() {
        let hash = ContentHash::new([0x0f; 32]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("0f0f"));
        assert_eq!(hash.to_string(), hex);
    }

    #[test]
    fn test_exact_match_implies_duplicate() {
        let result = DuplicateCheckResult::hashed(true);
        assert!(result.is_duplicate && result.is_exact_match);

        let result = DuplicateCheckResult::probable_duplicate();
        assert!(result.is_duplicate);
        assert!(!result.is_exact_match);
        assert_eq!(result.comparison_method, ComparisonMethod::SizeAndDate);
    }

    #[test]
    fn test_failed_result() {
        let result = DuplicateCheckResult::failed("boom");
        assert!(!result.is_success());
        assert!(!result.is_duplicate);
        assert_eq!(result.comparison_method, ComparisonMethod::None);
    }
}
