//! Persisted UI preferences (key-value, surviving across sessions).
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::db::{self, Pool};
use crate::model::SortMode;

/// Key under which the entity list sort mode is stored.
pub const SORT_PREFERENCE_KEY: &str = "table-editor-sort";

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Stored value for `key`, or `default` when missing or unreadable.
pub async fn preference_or(store: &dyn PreferenceStore, key: &str, default: &str) -> String {
    match store.get(key).await {
        Ok(Some(value)) => value,
        Ok(None) => default.to_string(),
        Err(err) => {
            warn!(?err, key, "failed to read preference; using default");
            default.to_string()
        }
    }
}

pub async fn load_sort_mode(store: &dyn PreferenceStore) -> SortMode {
    let raw = preference_or(store, SORT_PREFERENCE_KEY, SortMode::default().as_str()).await;
    SortMode::parse_mode(&raw).unwrap_or_else(|| {
        warn!(value = %raw, "ignoring unknown stored sort mode");
        SortMode::default()
    })
}

/// Preferences stored in the local SQLite database.
#[derive(Debug, Clone)]
pub struct SqlitePreferences {
    pool: Pool,
}

impl SqlitePreferences {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and migrate it.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = db::init_pool(database_url).await?;
        db::run_migrations(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferences {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        db::get_preference(&self.pool, key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        db::set_preference(&self.pool, key, value).await
    }
}

/// Non-persistent store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl PreferenceStore for MemoryPreferences {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sort_mode_defaults_to_alphabetical() {
        let store = MemoryPreferences::default();
        assert_eq!(load_sort_mode(&store).await, SortMode::Alphabetical);
    }

    #[tokio::test]
    async fn unknown_stored_sort_mode_falls_back() {
        let store = MemoryPreferences::default();
        store.set(SORT_PREFERENCE_KEY, "by-size").await.unwrap();
        assert_eq!(load_sort_mode(&store).await, SortMode::Alphabetical);
    }

    #[tokio::test]
    async fn sqlite_preferences_survive_reopen() {
        let td = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/prefs.db?mode=rwc", td.path().display());

        let store = SqlitePreferences::open(&url).await.unwrap();
        store
            .set(SORT_PREFERENCE_KEY, SortMode::GroupedAlphabetical.as_str())
            .await
            .unwrap();
        drop(store);

        let reopened = SqlitePreferences::open(&url).await.unwrap();
        assert_eq!(
            load_sort_mode(&reopened).await,
            SortMode::GroupedAlphabetical
        );
        assert_eq!(
            preference_or(&reopened, "missing", "fallback").await,
            "fallback"
        );
    }
}
