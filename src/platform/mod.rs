use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;
use crate::model::{
    CloneBackup, CloneResult, EntityPage, EntityQuery, ProjectTarget, Schema, TableSummary,
};
use crate::platform::model::{CloneBody, EntityTypesResponse};

pub mod model;

const PLATFORM_API_BASE: &str = "https://api.supabase.com/";
const CONNECTION_HEADER: &str = "x-connection-encrypted";

/// Remote calls the explorer depends on.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Fetch one page (zero-based) of the entity listing.
    async fn list_entities(&self, query: &EntityQuery, page: u32) -> Result<EntityPage, ApiError>;

    async fn list_schemas(&self, project: &ProjectTarget) -> Result<Vec<Schema>, ApiError>;

    async fn get_table(
        &self,
        project: &ProjectTarget,
        id: i64,
    ) -> Result<Option<TableSummary>, ApiError>;

    async fn trigger_clone(
        &self,
        project_ref: &str,
        body: &CloneBody,
    ) -> Result<CloneResult, ApiError>;

    async fn list_clone_backups(&self, project_ref: &str) -> Result<Vec<CloneBackup>, ApiError>;
}

#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PlatformClient {
    pub fn new(token: String) -> Result<Self, ApiError> {
        let base_url = Url::parse(PLATFORM_API_BASE)?;
        Self::with_base_url(token, base_url)
    }

    pub fn with_base_url(token: String, base_url: Url) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(concat!("table-explorer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ApiError> {
        let base_url = Url::parse(&cfg.platform.base_url)?;
        Self::with_base_url(cfg.platform.access_token.clone(), base_url)
    }

    /// Build an authenticated request. Every call carries a fresh request id.
    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        connection: Option<&str>,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Request, ApiError> {
        let endpoint = self.base_url.join(path)?;
        let mut builder = self
            .http
            .request(method, endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-Request-Id", Uuid::new_v4().to_string());
        if let Some(connection) = connection {
            builder = builder.header(CONNECTION_HEADER, connection);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.build()?)
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::Request) -> Result<T, ApiError> {
        info!(method = %request.method(), url = %request.url(), "platform request");
        for (name, value) in request.headers() {
            if name.as_str().eq_ignore_ascii_case("authorization")
                || name.as_str().eq_ignore_ascii_case(CONNECTION_HEADER)
            {
                debug!("  {}: [REDACTED]", name);
            } else {
                debug!("  {}: {}", name, value.to_str().unwrap_or("[invalid]"));
            }
        }

        let res = self.http.execute(request).await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            warn!(%status, body = %body, "platform API error");
            return Err(ApiError::from_response(status, &body));
        }
        debug!(%status, bytes = body.len(), "platform response");
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn list_entities(
        &self,
        query: &EntityQuery,
        page: u32,
    ) -> Result<EntityPage, ApiError> {
        let path = format!("platform/pg-meta/{}/entity-types", query.project.project_ref);
        let request = self.build_request(
            Method::GET,
            &path,
            Some(&query.project.connection_string),
            &entity_query_params(query, page),
            None,
        )?;
        let payload: EntityTypesResponse = self.execute(request).await?;
        let has_next = (u64::from(page) + 1) * u64::from(query.limit) < payload.data.count;
        Ok(EntityPage {
            entities: payload.data.entities,
            has_next,
        })
    }

    pub async fn list_schemas(&self, project: &ProjectTarget) -> Result<Vec<Schema>, ApiError> {
        let path = format!("platform/pg-meta/{}/schemas", project.project_ref);
        let request = self.build_request(
            Method::GET,
            &path,
            Some(&project.connection_string),
            &[],
            None,
        )?;
        self.execute(request).await
    }

    pub async fn get_table(
        &self,
        project: &ProjectTarget,
        id: i64,
    ) -> Result<Option<TableSummary>, ApiError> {
        let path = format!("platform/pg-meta/{}/tables/{}", project.project_ref, id);
        let request = self.build_request(
            Method::GET,
            &path,
            Some(&project.connection_string),
            &[],
            None,
        )?;
        match self.execute(request).await {
            Ok(table) => Ok(Some(table)),
            Err(ApiError::Remote { status, .. }) if status == reqwest::StatusCode::NOT_FOUND => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn trigger_clone(
        &self,
        project_ref: &str,
        body: &CloneBody,
    ) -> Result<CloneResult, ApiError> {
        let path = format!("platform/database/{}/clone", project_ref);
        let body = serde_json::to_value(body)?;
        let request = self.build_request(Method::POST, &path, None, &[], Some(&body))?;
        self.execute(request).await
    }

    pub async fn list_clone_backups(
        &self,
        project_ref: &str,
    ) -> Result<Vec<CloneBackup>, ApiError> {
        let path = format!("platform/database/{}/clone", project_ref);
        let request = self.build_request(Method::GET, &path, None, &[], None)?;
        self.execute(request).await
    }
}

#[async_trait]
impl PlatformService for PlatformClient {
    async fn list_entities(&self, query: &EntityQuery, page: u32) -> Result<EntityPage, ApiError> {
        PlatformClient::list_entities(self, query, page).await
    }

    async fn list_schemas(&self, project: &ProjectTarget) -> Result<Vec<Schema>, ApiError> {
        PlatformClient::list_schemas(self, project).await
    }

    async fn get_table(
        &self,
        project: &ProjectTarget,
        id: i64,
    ) -> Result<Option<TableSummary>, ApiError> {
        PlatformClient::get_table(self, project, id).await
    }

    async fn trigger_clone(
        &self,
        project_ref: &str,
        body: &CloneBody,
    ) -> Result<CloneResult, ApiError> {
        PlatformClient::trigger_clone(self, project_ref, body).await
    }

    async fn list_clone_backups(&self, project_ref: &str) -> Result<Vec<CloneBackup>, ApiError> {
        PlatformClient::list_clone_backups(self, project_ref).await
    }
}

/// Query string of the entity listing. Absent search means no filter.
pub fn entity_query_params(query: &EntityQuery, page: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![("schemas", query.schemas.join(","))];
    if let Some(search) = &query.search {
        params.push(("search", search.clone()));
    }
    params.push(("sort", query.sort.as_str().to_string()));
    params.push((
        "types",
        query
            .filter_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(","),
    ));
    params.push(("page", page.to_string()));
    params.push(("limit", query.limit.to_string()));
    params
}
