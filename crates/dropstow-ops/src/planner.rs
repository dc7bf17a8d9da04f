//! Grouping dropped items into a batch plan.
//!
//! Planning never touches the filesystem: it only partitions items and asks a
//! [`SuggestionResolver`] where each partition should go.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::debug;

use dropstow_core::{DroppedItem, Expiring, FileCategory, Result};

use crate::operation::BatchFileGroup;
use crate::BoxFuture;

/// A destination suggested for an item.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Folder the item should be moved into.
    pub destination: PathBuf,
    /// How sure the resolver is (0.0 to 1.0), if it knows.
    pub confidence: Option<f32>,
}

impl Suggestion {
    /// A suggestion without a confidence score.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            confidence: None,
        }
    }

    /// Set the confidence.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

impl From<PathBuf> for Suggestion {
    fn from(destination: PathBuf) -> Self {
        Self::new(destination)
    }
}

/// Decides where an item should go.
///
/// Rules, heuristics and model-backed categorization live behind this trait.
pub trait SuggestionResolver: Send + Sync {
    /// Suggest a destination folder for an item.
    fn suggest<'a>(&'a self, item: &'a DroppedItem) -> BoxFuture<'a, Result<Suggestion>>;
}

/// Sends every item to `root/<category>`.
#[derive(Debug, Clone)]
pub struct CategoryResolver {
    root: PathBuf,
}

impl CategoryResolver {
    /// Create a resolver rooted at a folder.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SuggestionResolver for CategoryResolver {
    fn suggest<'a>(&'a self, item: &'a DroppedItem) -> BoxFuture<'a, Result<Suggestion>> {
        let destination = self.root.join(item.category.folder_name());
        Box::pin(async move { Ok(Suggestion::new(destination)) })
    }
}

/// Sends every item to one folder.
#[derive(Debug, Clone)]
pub struct FixedResolver {
    folder: PathBuf,
}

impl FixedResolver {
    /// Create a resolver for a single folder.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }
}

impl SuggestionResolver for FixedResolver {
    fn suggest<'a>(&'a self, _item: &'a DroppedItem) -> BoxFuture<'a, Result<Suggestion>> {
        let destination = self.folder.clone();
        Box::pin(async move { Ok(Suggestion::new(destination)) })
    }
}

/// Remembers suggestions per (category, extension) for a limited time.
pub struct CachedResolver<R> {
    inner: R,
    ttl: Duration,
    cache: Mutex<HashMap<(FileCategory, String), Expiring<Suggestion>>>,
}

impl<R: SuggestionResolver> CachedResolver<R> {
    /// Wrap a resolver, keeping each answer for `ttl`.
    pub fn new(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every cached suggestion.
    pub fn invalidate(&self) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn cached(&self, key: &(FileCategory, String)) -> Option<Suggestion> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        match cache.get(key) {
            Some(entry) if !entry.is_expired() => entry.get().cloned(),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }
}

impl<R: SuggestionResolver> SuggestionResolver for CachedResolver<R> {
    fn suggest<'a>(&'a self, item: &'a DroppedItem) -> BoxFuture<'a, Result<Suggestion>> {
        Box::pin(async move {
            let key = (item.category, item.extension.clone());
            if let Some(hit) = self.cached(&key) {
                return Ok(hit);
            }

            let suggestion = self.inner.suggest(item).await?;
            self.cache
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, Expiring::new(suggestion.clone(), self.ttl));
            Ok(suggestion)
        })
    }
}

/// Groups dropped items by category and extension.
pub struct BatchPlanner {
    resolver: Box<dyn SuggestionResolver>,
}

impl BatchPlanner {
    /// Create a planner using the given resolver.
    pub fn new(resolver: impl SuggestionResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
        }
    }

    /// Partition items by (category, extension), in first-seen order, and
    /// resolve one destination per partition.
    ///
    /// Every group starts selected. Only resolver errors are returned.
    pub async fn group_items_by_destination(
        &self,
        items: Vec<DroppedItem>,
    ) -> Result<Vec<BatchFileGroup>> {
        let mut partitions: IndexMap<(FileCategory, String), Vec<DroppedItem>> = IndexMap::new();
        for item in items {
            partitions
                .entry((item.category, item.extension.clone()))
                .or_default()
                .push(item);
        }

        let mut groups = Vec::with_capacity(partitions.len());
        for ((category, extension), members) in partitions {
            let Some(first) = members.first() else {
                continue;
            };
            let suggestion = self.resolver.suggest(first).await?;
            debug!(
                %category,
                extension = %extension,
                destination = %suggestion.destination.display(),
                items = members.len(),
                "planned group"
            );

            groups.push(
                BatchFileGroup::new(category, extension, suggestion.destination, members)
                    .with_confidence(suggestion.confidence),
            );
        }

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl SuggestionResolver for CountingResolver {
        fn suggest<'a>(&'a self, item: &'a DroppedItem) -> BoxFuture<'a, Result<Suggestion>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let dest = PathBuf::from("/sorted").join(&item.extension);
            Box::pin(async move { Ok(Suggestion::new(dest)) })
        }
    }

    #[tokio::test]
    async fn test_cached_resolver_reuses_answers() {
        let resolver = CachedResolver::new(
            CountingResolver {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(60),
        );
        let a = DroppedItem::new("/in/a.txt", false, 1);
        let b = DroppedItem::new("/in/b.txt", false, 1);

        let first = resolver.suggest(&a).await.unwrap();
        let second = resolver.suggest(&b).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 1);

        resolver.invalidate();
        resolver.suggest(&a).await.unwrap();
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_resolver_expires() {
        let resolver = CachedResolver::new(
            CountingResolver {
                calls: AtomicUsize::new(0),
            },
            Duration::ZERO,
        );
        let a = DroppedItem::new("/in/a.txt", false, 1);

        resolver.suggest(&a).await.unwrap();
        resolver.suggest(&a).await.unwrap();
        assert_eq!(resolver.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_category_resolver() {
        let resolver = CategoryResolver::new("/sorted");
        let item = DroppedItem::new("/in/song.mp3", false, 1);
        let suggestion = resolver.suggest(&item).await.unwrap();
        assert_eq!(suggestion.destination, PathBuf::from("/sorted/Audio"));
    }
}
