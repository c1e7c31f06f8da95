//! Incrementally loaded entity list driven by the filter state.
//!
//! Every change to the filter (schema, search text, visible types, sort)
//! starts a new query from the first page. A query is identified by its
//! [`EntityQuery`] key plus an epoch; page responses that arrive for anything
//! but the current query are dropped, so the list never mixes entities fetched
//! under different filters.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::cache::{QueryCache, QueryKey};
use crate::error::ApiError;
use crate::model::{
    Entity, EntityFilterState, EntityQuery, EntityType, ProjectTarget, Schema, SortMode,
};
use crate::platform::PlatformService;
use crate::prefs::{load_sort_mode, PreferenceStore, SORT_PREFERENCE_KEY};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyState {
    NoEntities,
    NoResults { search: String },
}

impl EmptyState {
    pub fn title(&self) -> &'static str {
        match self {
            EmptyState::NoEntities => "No entities available",
            EmptyState::NoResults { .. } => "No results found",
        }
    }

    pub fn description(&self) -> String {
        match self {
            EmptyState::NoEntities => "This schema has no entities available yet".to_string(),
            EmptyState::NoResults { search } => {
                format!("Your search for \"{}\" did not return any results", search)
            }
        }
    }
}

/// What the list area should render right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserView {
    Loading,
    Error {
        message: String,
    },
    Empty(EmptyState),
    List {
        entities: Vec<Entity>,
        has_next_page: bool,
        is_fetching_next_page: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error(String),
}

#[derive(Debug)]
struct ListState {
    key: Option<EntityQuery>,
    epoch: u64,
    status: QueryStatus,
    entities: Vec<Entity>,
    previous: Option<Vec<Entity>>,
    next_page: u32,
    has_next: bool,
    in_flight: bool,
}

impl ListState {
    fn new() -> Self {
        Self {
            key: None,
            epoch: 0,
            status: QueryStatus::Idle,
            entities: Vec::new(),
            previous: None,
            next_page: 0,
            has_next: false,
            in_flight: false,
        }
    }

    fn is_current(&self, key: &EntityQuery, epoch: u64) -> bool {
        self.epoch == epoch && self.key.as_ref() == Some(key)
    }
}

pub struct EntityBrowser {
    service: Arc<dyn PlatformService>,
    prefs: Arc<dyn PreferenceStore>,
    cache: Arc<QueryCache>,
    project: ProjectTarget,
    page_size: u32,
    filter: Store<EntityFilterState>,
    state: Mutex<ListState>,
}

impl EntityBrowser {
    /// Build a browser with the default filter and the persisted sort mode.
    /// Nothing is fetched until the first filter change, [`Self::reload`] or
    /// [`Self::load`].
    pub async fn new(
        service: Arc<dyn PlatformService>,
        prefs: Arc<dyn PreferenceStore>,
        cache: Arc<QueryCache>,
        project: ProjectTarget,
        page_size: u32,
    ) -> Self {
        let sort = load_sort_mode(prefs.as_ref()).await;
        let filter = EntityFilterState {
            sort,
            ..EntityFilterState::default()
        };
        Self {
            service,
            prefs,
            cache,
            project,
            page_size: page_size.max(1),
            filter: Store::new(filter),
            state: Mutex::new(ListState::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn filter(&self) -> EntityFilterState {
        self.filter.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<EntityFilterState> {
        self.filter.subscribe()
    }

    /// Whether the type filter button should show as active.
    pub fn is_type_filter_active(&self) -> bool {
        self.filter.snapshot().is_type_filter_active()
    }

    /// Key of the query currently backing the list.
    pub fn current_query(&self) -> Option<EntityQuery> {
        self.lock().key.clone()
    }

    /// Fetch the first page if no query has run yet.
    pub async fn load(&self) {
        let idle = self.lock().status == QueryStatus::Idle;
        if idle {
            self.restart().await;
        }
    }

    /// Apply several filter edits at once. The query restarts at most once.
    pub async fn update_filter(&self, edit: impl FnOnce(&mut EntityFilterState)) {
        if self.filter.update(edit) {
            self.restart().await;
        }
    }

    #[instrument(skip_all)]
    pub async fn update_search(&self, text: &str) {
        self.update_filter(|f| f.search_text = text.to_string()).await;
    }

    #[instrument(skip_all, fields(entity_type = %entity_type))]
    pub async fn toggle_type(&self, entity_type: EntityType) {
        self.update_filter(|f| {
            if !f.visible_types.remove(&entity_type) {
                f.visible_types.insert(entity_type);
            }
        })
        .await;
    }

    #[instrument(skip_all, fields(entity_type = %entity_type))]
    pub async fn set_only_type(&self, entity_type: EntityType) {
        self.update_filter(|f| f.select_only(entity_type)).await;
    }

    /// Switch schema; the search text is cleared along with it.
    #[instrument(skip_all, fields(schema = %name))]
    pub async fn select_schema(&self, name: &str) {
        self.update_filter(|f| f.select_schema(name)).await;
    }

    /// Change the sort mode and remember it for later sessions.
    #[instrument(skip_all, fields(sort = sort.as_str()))]
    pub async fn set_sort(&self, sort: SortMode) {
        if let Err(err) = self.prefs.set(SORT_PREFERENCE_KEY, sort.as_str()).await {
            warn!(?err, "failed to persist sort preference");
        }
        if self.filter.update(|f| f.sort = sort) {
            self.restart().await;
        }
    }

    /// Restart the current query from the first page.
    pub async fn reload(&self) {
        self.restart().await;
    }

    /// Select the schema of the table with `id`, if it has one.
    #[instrument(skip_all, fields(table_id = id))]
    pub async fn sync_schema_from_table(&self, id: i64) -> Result<(), ApiError> {
        let table = self.service.get_table(&self.project, id).await?;
        let Some(schema) = table.and_then(|t| t.schema) else {
            debug!("selected table has no schema");
            return Ok(());
        };
        self.update_filter(|f| f.selected_schema = schema).await;
        Ok(())
    }

    /// Schemas of the project, sorted by name. Served from the query cache.
    pub async fn schemas(&self) -> Result<Vec<Schema>, ApiError> {
        let service = Arc::clone(&self.service);
        let project = self.project.clone();
        let mut schemas: Vec<Schema> = self
            .cache
            .fetch(QueryKey::schemas(&self.project.project_ref), || async move {
                service.list_schemas(&project).await
            })
            .await?;
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schemas)
    }

    /// Whether the selected schema is protected (read-only in the editor).
    pub async fn is_locked(&self) -> Result<bool, ApiError> {
        let selected = self.filter.snapshot().selected_schema;
        let schemas = self.schemas().await?;
        Ok(schemas
            .iter()
            .find(|s| s.name == selected)
            .map(Schema::is_protected)
            .unwrap_or(false))
    }

    /// Fetch and append the next page. No-op without a next page, while a
    /// fetch is in flight, or unless the current query has succeeded.
    #[instrument(skip_all)]
    pub async fn load_more(&self) {
        let (key, epoch, page) = {
            let mut st = self.lock();
            if st.status != QueryStatus::Success || !st.has_next || st.in_flight {
                debug!(
                    has_next = st.has_next,
                    in_flight = st.in_flight,
                    "load_more skipped"
                );
                return;
            }
            let Some(key) = st.key.clone() else {
                return;
            };
            st.in_flight = true;
            (key, st.epoch, st.next_page)
        };
        self.fetch_page(key, epoch, page).await;
    }

    async fn restart(&self) {
        let filter = self.filter.snapshot();
        let key = EntityQuery::from_filter(&self.project, &filter, self.page_size);
        let epoch = {
            let mut st = self.lock();
            let previous = if !filter.search_text.is_empty() {
                let current = std::mem::take(&mut st.entities);
                if current.is_empty() {
                    st.previous.take()
                } else {
                    Some(current)
                }
            } else {
                None
            };
            st.epoch += 1;
            st.key = Some(key.clone());
            st.status = QueryStatus::Loading;
            st.entities = Vec::new();
            st.previous = previous;
            st.next_page = 0;
            st.has_next = false;
            st.in_flight = true;
            st.epoch
        };
        debug!(epoch, schema = %filter.selected_schema, "entity query restarted");
        self.fetch_page(key, epoch, 0).await;
    }

    async fn fetch_page(&self, key: EntityQuery, epoch: u64, page: u32) {
        let result = self.service.list_entities(&key, page).await;

        let mut st = self.lock();
        if !st.is_current(&key, epoch) {
            debug!(epoch, page, "discarding page of superseded query");
            return;
        }
        st.in_flight = false;
        st.previous = None;
        match result {
            Ok(fetched) => {
                info!(
                    epoch,
                    page,
                    count = fetched.entities.len(),
                    has_next = fetched.has_next,
                    "entity page loaded"
                );
                st.entities.extend(fetched.entities);
                st.next_page = page + 1;
                st.has_next = fetched.has_next;
                st.status = QueryStatus::Success;
            }
            Err(err) => {
                warn!(?err, epoch, page, "failed to retrieve entities");
                st.has_next = false;
                st.status = QueryStatus::Error(err.message());
            }
        }
    }

    pub fn view(&self) -> BrowserView {
        let search_text = self.filter.snapshot().search_text;
        let st = self.lock();
        match &st.status {
            QueryStatus::Idle => BrowserView::Loading,
            QueryStatus::Loading => match &st.previous {
                Some(previous) if !previous.is_empty() => BrowserView::List {
                    entities: previous.clone(),
                    has_next_page: false,
                    is_fetching_next_page: false,
                },
                _ => BrowserView::Loading,
            },
            QueryStatus::Error(message) => BrowserView::Error {
                message: message.clone(),
            },
            QueryStatus::Success if st.entities.is_empty() => {
                if search_text.is_empty() {
                    BrowserView::Empty(EmptyState::NoEntities)
                } else {
                    BrowserView::Empty(EmptyState::NoResults {
                        search: search_text,
                    })
                }
            }
            QueryStatus::Success => BrowserView::List {
                entities: st.entities.clone(),
                has_next_page: st.has_next,
                is_fetching_next_page: st.in_flight,
            },
        }
    }
}
