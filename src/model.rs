use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kinds of database objects listed by the browser.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Table,
    View,
    MaterializedView,
    ForeignTable,
    PartitionedTable,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Table,
        EntityType::View,
        EntityType::MaterializedView,
        EntityType::ForeignTable,
        EntityType::PartitionedTable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Table => "table",
            EntityType::View => "view",
            EntityType::MaterializedView => "materialized_view",
            EntityType::ForeignTable => "foreign_table",
            EntityType::PartitionedTable => "partitioned_table",
        }
    }

    /// Label shown next to the filter checkbox.
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Table => "table",
            EntityType::View => "view",
            EntityType::MaterializedView => "materialized view",
            EntityType::ForeignTable => "foreign table",
            EntityType::PartitionedTable => "partitioned table",
        }
    }

    pub fn full_set() -> BTreeSet<EntityType> {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown entity type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SortMode {
    #[default]
    #[serde(rename = "alphabetical")]
    Alphabetical,
    #[serde(rename = "grouped-alphabetical")]
    GroupedAlphabetical,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Alphabetical => "alphabetical",
            SortMode::GroupedAlphabetical => "grouped-alphabetical",
        }
    }

    pub fn parse_mode(s: &str) -> Option<Self> {
        match s {
            "alphabetical" => Some(SortMode::Alphabetical),
            "grouped-alphabetical" => Some(SortMode::GroupedAlphabetical),
            _ => None,
        }
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_mode(s).ok_or_else(|| format!("unknown sort mode '{}'", s))
    }
}

/// Schemas managed by the platform; read-only through the table editor.
pub static PROTECTED_SCHEMAS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "auth",
        "cron",
        "extensions",
        "information_schema",
        "net",
        "pgsodium",
        "pgsodium_masks",
        "pgbouncer",
        "pgtle",
        "realtime",
        "storage",
        "supabase_functions",
        "supabase_migrations",
        "vault",
        "graphql",
        "graphql_public",
    ]
    .into_iter()
    .collect()
});

pub fn is_protected_schema(name: &str) -> bool {
    PROTECTED_SCHEMAS.contains(name)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub schema: String,
    #[serde(rename = "type")]
    pub kind: EntityType,
    #[serde(default)]
    pub comment: Option<String>,
}

/// One page of the entity listing, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    pub has_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
}

impl Schema {
    pub fn is_protected(&self) -> bool {
        is_protected_schema(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
}

/// Filter inputs that key the entity query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFilterState {
    pub selected_schema: String,
    pub search_text: String,
    pub visible_types: BTreeSet<EntityType>,
    pub sort: SortMode,
}

impl Default for EntityFilterState {
    fn default() -> Self {
        Self {
            selected_schema: "public".to_string(),
            search_text: String::new(),
            visible_types: EntityType::full_set(),
            sort: SortMode::default(),
        }
    }
}

impl EntityFilterState {
    /// Search text as sent to the server; blank text means no search filter.
    pub fn search_term(&self) -> Option<&str> {
        let trimmed = self.search_text.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn is_type_filter_active(&self) -> bool {
        self.visible_types.len() != EntityType::ALL.len()
    }

    /// Show only entities of `entity_type`.
    pub fn select_only(&mut self, entity_type: EntityType) {
        self.visible_types = BTreeSet::from([entity_type]);
    }

    /// Switch schema, dropping the search text.
    pub fn select_schema(&mut self, name: &str) {
        self.search_text.clear();
        self.selected_schema = name.to_string();
    }
}

/// Project and database connection that pg-meta calls run against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectTarget {
    pub project_ref: String,
    pub connection_string: String,
}

/// Composite key of the entity listing. Two fetches belong to the same
/// sequence only if their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityQuery {
    pub project: ProjectTarget,
    pub schemas: Vec<String>,
    pub search: Option<String>,
    pub sort: SortMode,
    pub filter_types: Vec<EntityType>,
    pub limit: u32,
}

impl EntityQuery {
    pub fn from_filter(project: &ProjectTarget, filter: &EntityFilterState, limit: u32) -> Self {
        Self {
            project: project.clone(),
            schemas: vec![filter.selected_schema.clone()],
            search: filter.search_term().map(str::to_string),
            sort: filter.sort,
            filter_types: filter.visible_types.iter().copied().collect(),
            limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloneRequest {
    pub project_ref: String,
    pub clone_backup_id: i64,
    pub new_project_name: String,
    pub new_db_pass: String,
}

/// Success payload of the clone call; the platform does not promise a shape.
pub type CloneResult = serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloneBackup {
    pub id: i64,
    pub inserted_at: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<String>,
}
