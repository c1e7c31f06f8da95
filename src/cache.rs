//! Keyed cache of remote reads.
//!
//! Entries are served until invalidated; an invalidated entry stays visible as
//! stale and is replaced by the next read through [`QueryCache::fetch`].
//! Each key carries a generation bumped by every invalidation, so a read that
//! started before an invalidation never lands as fresh.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Schemas { project_ref: String },
    CloneBackups { project_ref: String },
}

impl QueryKey {
    pub fn schemas(project_ref: &str) -> Self {
        QueryKey::Schemas {
            project_ref: project_ref.to_string(),
        }
    }

    pub fn clone_backups(project_ref: &str) -> Self {
        QueryKey::CloneBackups {
            project_ref: project_ref.to_string(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Schemas { project_ref } => write!(f, "projects/{}/schemas", project_ref),
            QueryKey::CloneBackups { project_ref } => {
                write!(f, "projects/{}/clone-backups", project_ref)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stale: bool,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<QueryKey, CacheEntry>,
    invalidations: HashMap<QueryKey, u64>,
}

impl CacheInner {
    fn generation(&self, key: &QueryKey) -> u64 {
        self.invalidations.get(key).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
pub struct QueryCache {
    inner: Mutex<CacheInner>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the fresh cached value for `key`, or run `fetcher` and store its
    /// result. Failed fetches leave the cache untouched. A result whose key was
    /// invalidated while `fetcher` ran is returned but stored as stale.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let (cached, generation) = {
            let inner = self.lock();
            let cached = inner
                .entries
                .get(&key)
                .filter(|entry| !entry.stale)
                .map(|entry| entry.value.clone());
            (cached, inner.generation(&key))
        };
        if let Some(value) = cached {
            debug!("cache hit");
            return Ok(serde_json::from_value(value)?);
        }

        debug!("cache miss");
        let fresh = fetcher().await?;
        let value = serde_json::to_value(&fresh)?;
        let mut inner = self.lock();
        let stale = inner.generation(&key) != generation;
        if stale {
            debug!("key invalidated during fetch; storing as stale");
        }
        inner.entries.insert(key, CacheEntry { value, stale });
        Ok(fresh)
    }

    /// Mark `key` stale so the next read goes to the source.
    /// Returns whether a cached entry existed.
    #[instrument(skip_all, fields(key = %key))]
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut inner = self.lock();
        *inner.invalidations.entry(key.clone()).or_insert(0) += 1;
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                debug!("invalidated cached entry");
                true
            }
            None => false,
        }
    }

    /// `None` when nothing is cached for `key`.
    pub fn is_stale(&self, key: &QueryKey) -> Option<bool> {
        self.lock().entries.get(key).map(|entry| entry.stale)
    }

    pub fn invalidation_count(&self, key: &QueryKey) -> u64 {
        self.lock().generation(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[tokio::test]
    async fn serves_fresh_entry_without_refetch() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);
        let key = QueryKey::schemas("proj");
        for _ in 0..3 {
            let v: Vec<String> = cache
                .fetch(key.clone(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["public".to_string()])
                })
                .await
                .unwrap();
            assert_eq!(v, vec!["public".to_string()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.is_stale(&key), Some(false));
    }

    #[tokio::test]
    async fn refetches_after_invalidation() {
        let cache = QueryCache::new();
        let key = QueryKey::clone_backups("proj");
        let first: u32 = cache.fetch(key.clone(), || async { Ok(1) }).await.unwrap();
        assert!(cache.invalidate(&key));
        assert_eq!(cache.is_stale(&key), Some(true));
        let second: u32 = cache.fetch(key.clone(), || async { Ok(2) }).await.unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(cache.is_stale(&key), Some(false));
        assert_eq!(cache.invalidation_count(&key), 1);
    }

    #[tokio::test]
    async fn invalidation_during_fetch_forces_next_read_to_source() {
        let cache = QueryCache::new();
        let key = QueryKey::clone_backups("proj");
        let calls = AtomicUsize::new(0);
        let gate = Notify::new();

        let (first, _) = tokio::join!(
            cache.fetch(key.clone(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                Ok(vec!["pre-clone".to_string()])
            }),
            async {
                cache.invalidate(&key);
                gate.notify_one();
            }
        );
        assert_eq!(first.unwrap(), vec!["pre-clone".to_string()]);
        assert_eq!(cache.is_stale(&key), Some(true));

        let second: Vec<String> = cache
            .fetch(key.clone(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec!["post-clone".to_string()])
            })
            .await
            .unwrap();
        assert_eq!(second, vec!["post-clone".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.is_stale(&key), Some(false));
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let cache = QueryCache::new();
        let key = QueryKey::schemas("proj");
        let err = cache
            .fetch::<u32, _, _>(key.clone(), || async { Err(ApiError::Validation("boom")) })
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(cache.is_stale(&key), None);
    }

    #[test]
    fn invalidating_missing_key_is_counted() {
        let cache = QueryCache::new();
        let key = QueryKey::clone_backups("other");
        assert!(!cache.invalidate(&key));
        assert_eq!(cache.invalidation_count(&key), 1);
        assert_eq!(cache.invalidation_count(&QueryKey::clone_backups("proj")), 0);
    }
}
