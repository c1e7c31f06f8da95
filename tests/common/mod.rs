#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use table_explorer::error::ApiError;
use table_explorer::model::{
    CloneBackup, CloneResult, Entity, EntityPage, EntityQuery, EntityType, ProjectTarget, Schema,
    SortMode, TableSummary,
};
use table_explorer::notify::Notifier;
use table_explorer::platform::model::CloneBody;
use table_explorer::platform::PlatformService;
use tokio::sync::{Mutex, Notify};

pub fn project() -> ProjectTarget {
    ProjectTarget {
        project_ref: "proj".into(),
        connection_string: "enc".into(),
    }
}

fn entity(id: i64, schema: &str, name: &str, kind: EntityType) -> Entity {
    Entity {
        id,
        name: name.into(),
        schema: schema.into(),
        kind,
        comment: None,
    }
}

pub fn fixture_entities() -> Vec<Entity> {
    vec![
        entity(1, "public", "users", EntityType::Table),
        entity(2, "public", "orders", EntityType::Table),
        entity(3, "public", "products", EntityType::Table),
        entity(4, "public", "user_roles", EntityType::Table),
        entity(5, "public", "active_users", EntityType::View),
        entity(6, "public", "monthly_sales", EntityType::MaterializedView),
        entity(7, "public", "remote_events", EntityType::ForeignTable),
        entity(8, "public", "events", EntityType::PartitionedTable),
        entity(100, "auth", "users", EntityType::Table),
        entity(101, "auth", "sessions", EntityType::Table),
    ]
}

pub fn names(entities: &[Entity]) -> Vec<String> {
    entities.iter().map(|e| e.name.clone()).collect()
}

type GateKey = (Option<String>, u32);

/// In-memory platform that answers from fixtures and records every call.
#[derive(Default)]
pub struct FixturePlatform {
    entities: Vec<Entity>,
    entity_calls: Mutex<Vec<(EntityQuery, u32)>>,
    gates: Mutex<HashMap<GateKey, Arc<Notify>>>,
    entity_failure: Mutex<Option<String>>,
    schema_calls: Mutex<usize>,
    clone_responses: Mutex<VecDeque<Result<Value, (StatusCode, String)>>>,
    clone_calls: Mutex<Vec<(String, CloneBody)>>,
    backup_calls: Mutex<Vec<String>>,
}

impl FixturePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entities: fixture_entities(),
            ..Default::default()
        })
    }

    /// Hold the response for `(search, page)` until the returned handle is notified.
    pub async fn hold(&self, search: Option<&str>, page: u32) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .await
            .insert((search.map(str::to_string), page), Arc::clone(&gate));
        gate
    }

    pub async fn fail_entities(&self, message: Option<&str>) {
        *self.entity_failure.lock().await = message.map(str::to_string);
    }

    pub async fn push_clone_response(&self, response: Result<Value, (StatusCode, String)>) {
        self.clone_responses.lock().await.push_back(response);
    }

    pub async fn entity_calls(&self) -> Vec<(EntityQuery, u32)> {
        self.entity_calls.lock().await.clone()
    }

    pub async fn schema_calls(&self) -> usize {
        *self.schema_calls.lock().await
    }

    pub async fn clone_calls(&self) -> Vec<(String, CloneBody)> {
        self.clone_calls.lock().await.clone()
    }

    pub async fn backup_calls(&self) -> Vec<String> {
        self.backup_calls.lock().await.clone()
    }

    fn matching(&self, query: &EntityQuery) -> Vec<Entity> {
        let search = query.search.as_ref().map(|s| s.to_lowercase());
        let mut found: Vec<Entity> = self
            .entities
            .iter()
            .filter(|e| query.schemas.contains(&e.schema))
            .filter(|e| query.filter_types.contains(&e.kind))
            .filter(|e| match &search {
                Some(s) => e.name.to_lowercase().contains(s),
                None => true,
            })
            .cloned()
            .collect();
        match query.sort {
            SortMode::Alphabetical => found.sort_by(|a, b| a.name.cmp(&b.name)),
            SortMode::GroupedAlphabetical => {
                found.sort_by(|a, b| (a.kind, &a.name).cmp(&(b.kind, &b.name)))
            }
        }
        found
    }
}

#[async_trait]
impl PlatformService for FixturePlatform {
    async fn list_entities(&self, query: &EntityQuery, page: u32) -> Result<EntityPage, ApiError> {
        self.entity_calls.lock().await.push((query.clone(), page));
        let gate = self
            .gates
            .lock()
            .await
            .remove(&(query.search.clone(), page));
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(message) = self.entity_failure.lock().await.clone() {
            return Err(ApiError::Remote {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message,
            });
        }

        let all = self.matching(query);
        let limit = query.limit as usize;
        let start = page as usize * limit;
        let entities: Vec<Entity> = all.iter().skip(start).take(limit).cloned().collect();
        Ok(EntityPage {
            entities,
            has_next: start + limit < all.len(),
        })
    }

    async fn list_schemas(&self, _project: &ProjectTarget) -> Result<Vec<Schema>, ApiError> {
        *self.schema_calls.lock().await += 1;
        Ok(vec![
            Schema {
                id: 2,
                name: "public".into(),
                owner: Some("postgres".into()),
            },
            Schema {
                id: 1,
                name: "auth".into(),
                owner: Some("supabase_admin".into()),
            },
            Schema {
                id: 3,
                name: "empty".into(),
                owner: None,
            },
        ])
    }

    async fn get_table(
        &self,
        _project: &ProjectTarget,
        id: i64,
    ) -> Result<Option<TableSummary>, ApiError> {
        Ok(self
            .entities
            .iter()
            .find(|e| e.id == id)
            .map(|e| TableSummary {
                id: e.id,
                name: e.name.clone(),
                schema: Some(e.schema.clone()),
            }))
    }

    async fn trigger_clone(
        &self,
        project_ref: &str,
        body: &CloneBody,
    ) -> Result<CloneResult, ApiError> {
        self.clone_calls
            .lock()
            .await
            .push((project_ref.to_string(), body.clone()));
        match self.clone_responses.lock().await.pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err((status, message))) => Err(ApiError::Remote { status, message }),
            None => Ok(json!({ "ref": "cloned-ref" })),
        }
    }

    async fn list_clone_backups(&self, project_ref: &str) -> Result<Vec<CloneBackup>, ApiError> {
        self.backup_calls.lock().await.push(project_ref.to_string());
        Ok(vec![CloneBackup {
            id: 1,
            inserted_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            status: Some("COMPLETED".into()),
        }])
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub errors: std::sync::Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
