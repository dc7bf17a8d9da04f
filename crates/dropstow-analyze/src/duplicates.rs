//! Duplicate detection between a source file and a destination path.
//!
//! Sizes are compared first so that most non-duplicates are rejected without
//! reading any content. Hashing streams both files in fixed-size chunks, so
//! memory use does not depend on file size.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use derive_builder::Builder;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use dropstow_core::{
    ComparisonMethod, ContentHash, DuplicateCheckResult, EngineConfig, FileComparisonInfo,
    MoveError, Result, ensure_not_blank,
};

/// Configuration for duplicate detection.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct DuplicateConfig {
    /// When false every check short-circuits to "no duplicate".
    #[builder(default = "true")]
    pub enabled: bool,

    /// Files larger than this are compared by size and date only.
    #[builder(default = "dropstow_core::EngineConfig::default().hash_size_limit")]
    pub hash_size_limit: u64,

    /// Bytes read per hashing step.
    #[builder(default = "8 * 1024")]
    pub chunk_size: usize,

    /// Allowed difference between modification times.
    #[builder(default = "Duration::from_secs(2)")]
    pub timestamp_tolerance: Duration,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for DuplicateConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            enabled: config.duplicate_detection_enabled,
            hash_size_limit: config.hash_size_limit,
            chunk_size: config.hash_chunk_size.max(1),
            timestamp_tolerance: config.timestamp_tolerance(),
        }
    }
}

impl DuplicateConfig {
    /// Create a new config builder.
    pub fn builder() -> DuplicateConfigBuilder {
        DuplicateConfigBuilder::default()
    }
}

/// Compares a source file against a destination path.
#[derive(Debug)]
pub struct DuplicateDetector {
    config: DuplicateConfig,
    files_hashed: AtomicU64,
}

impl DuplicateDetector {
    /// Create a detector with default config.
    pub fn new() -> Self {
        Self::with_config(DuplicateConfig::default())
    }

    /// Create a detector with custom config.
    pub fn with_config(config: DuplicateConfig) -> Self {
        Self {
            config,
            files_hashed: AtomicU64::new(0),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &DuplicateConfig {
        &self.config
    }

    /// Whether duplicate detection is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Enable or disable detection.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Number of files fully hashed by this detector so far.
    pub fn files_hashed(&self) -> u64 {
        self.files_hashed.load(Ordering::Relaxed)
    }

    /// Check whether `destination` already holds content equivalent to `source`.
    ///
    /// Blank paths and cancellation are returned as errors. Problems reading
    /// either file are reported in the result's `error` field instead, so a
    /// caller can treat them as a failed check for that one item.
    pub async fn check_for_duplicate(
        &self,
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<DuplicateCheckResult> {
        ensure_not_blank(source, "Source")?;
        ensure_not_blank(destination, "Destination")?;

        if cancel.is_cancelled() {
            return Err(MoveError::Cancelled);
        }

        if !self.config.enabled {
            return Ok(DuplicateCheckResult::no_duplicate(ComparisonMethod::None));
        }

        let source_info = match FileComparisonInfo::from_path(source) {
            Ok(info) => info,
            Err(e) => {
                return Ok(DuplicateCheckResult::failed(format!(
                    "Cannot read source {}: {e}",
                    source.display()
                )));
            }
        };

        let dest_info = match FileComparisonInfo::from_path(destination) {
            Ok(info) => info,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DuplicateCheckResult::no_duplicate(ComparisonMethod::None)
                    .with_files(Some(source_info), None));
            }
            Err(e) => {
                return Ok(DuplicateCheckResult::failed(format!(
                    "Cannot read destination {}: {e}",
                    destination.display()
                ))
                .with_files(Some(source_info), None));
            }
        };

        // Folders are never compared by content.
        if source.is_dir() || destination.is_dir() {
            return Ok(DuplicateCheckResult::no_duplicate(ComparisonMethod::None)
                .with_files(Some(source_info), Some(dest_info)));
        }

        if source_info.size != dest_info.size {
            debug!(
                source = %source.display(),
                destination = %destination.display(),
                "sizes differ, not a duplicate"
            );
            return Ok(DuplicateCheckResult::no_duplicate(ComparisonMethod::SizeOnly)
                .with_files(Some(source_info), Some(dest_info)));
        }

        let limit = self.config.hash_size_limit;
        if source_info.size > limit || dest_info.size > limit {
            let delta = time_distance(source_info.modified, dest_info.modified);
            let result = if delta <= self.config.timestamp_tolerance {
                DuplicateCheckResult::probable_duplicate()
            } else {
                DuplicateCheckResult::no_duplicate(ComparisonMethod::SizeAndDate)
            };
            return Ok(result.with_files(Some(source_info), Some(dest_info)));
        }

        let source_hash = match self.compute_file_hash(source, cancel).await {
            Ok(hash) => hash,
            Err(MoveError::Cancelled) => return Err(MoveError::Cancelled),
            Err(e) => {
                return Ok(DuplicateCheckResult::failed(e.to_string())
                    .with_files(Some(source_info), Some(dest_info)));
            }
        };
        let dest_hash = match self.compute_file_hash(destination, cancel).await {
            Ok(hash) => hash,
            Err(MoveError::Cancelled) => return Err(MoveError::Cancelled),
            Err(e) => {
                return Ok(DuplicateCheckResult::failed(e.to_string())
                    .with_files(Some(source_info.with_hash(source_hash)), Some(dest_info)));
            }
        };

        let equal = source_hash == dest_hash;
        debug!(
            source = %source.display(),
            destination = %destination.display(),
            equal,
            "compared content hashes"
        );

        Ok(DuplicateCheckResult::hashed(equal).with_files(
            Some(source_info.with_hash(source_hash)),
            Some(dest_info.with_hash(dest_hash)),
        ))
    }

    /// Compute the SHA-256 hash of a file, streaming it in chunks.
    pub async fn compute_file_hash(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ContentHash> {
        ensure_not_blank(path, "File")?;

        if cancel.is_cancelled() {
            return Err(MoveError::Cancelled);
        }

        let owned = path.to_path_buf();
        let cancel = cancel.clone();
        let chunk_size = self.config.chunk_size.max(1);

        let hash = tokio::task::spawn_blocking(move || hash_file(&owned, chunk_size, &cancel))
            .await
            .map_err(|e| MoveError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(format!("Task failed: {e}")),
            })??;

        self.files_hashed.fetch_add(1, Ordering::Relaxed);
        Ok(hash)
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a file on the current thread, checking for cancellation per chunk.
fn hash_file(path: &Path, chunk_size: usize, cancel: &CancellationToken) -> Result<ContentHash> {
    let mut file = File::open(path).map_err(|e| MoveError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size];

    loop {
        if cancel.is_cancelled() {
            return Err(MoveError::Cancelled);
        }

        let bytes_read = file.read(&mut buffer).map_err(|e| MoveError::io(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(ContentHash::new(hasher.finalize().into()))
}

/// Absolute distance between two timestamps.
fn time_distance(a: SystemTime, b: SystemTime) -> Duration {
    match a.duration_since(b) {
        Ok(d) => d,
        Err(e) => e.duration(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_hash_file_known_vector() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();

        let hash = hash_file(&path, 2, &CancellationToken::new()).unwrap();
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_file_chunk_size_does_not_matter() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        let cancel = CancellationToken::new();
        let small = hash_file(&path, 7, &cancel).unwrap();
        let large = hash_file(&path, 64 * 1024, &cancel).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_hash_file_cancelled() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        fs::write(&path, b"content").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            hash_file(&path, 8, &cancel),
            Err(MoveError::Cancelled)
        ));
    }

    #[test]
    fn test_time_distance_is_symmetric() {
        let now = SystemTime::now();
        let later = now + Duration::from_secs(3);
        assert_eq!(time_distance(now, later), Duration::from_secs(3));
        assert_eq!(time_distance(later, now), Duration::from_secs(3));
    }
}
