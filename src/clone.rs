//! Project clone trigger.
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::cache::{QueryCache, QueryKey};
use crate::error::ApiError;
use crate::model::{CloneBackup, CloneRequest, CloneResult};
use crate::notify::Notifier;
use crate::platform::model::CloneBody;
use crate::platform::PlatformService;

pub type SuccessHandler = Box<dyn Fn(&CloneResult, &CloneRequest) + Send + Sync>;
pub type ErrorHandler = Box<dyn Fn(&ApiError, &CloneRequest) + Send + Sync>;

/// Ask the platform to clone `request.project_ref` from a backup.
///
/// An empty project ref fails before any request is sent.
pub async fn trigger_clone(
    service: &dyn PlatformService,
    request: &CloneRequest,
) -> Result<CloneResult, ApiError> {
    if request.project_ref.is_empty() {
        return Err(ApiError::Validation("Project ref is required"));
    }
    let body = CloneBody {
        clone_backup_id: request.clone_backup_id,
        new_project_name: request.new_project_name.clone(),
        new_db_pass: request.new_db_pass.clone(),
    };
    service.trigger_clone(&request.project_ref, &body).await
}

/// Single-shot clone action with cache invalidation and error reporting.
///
/// On success the cached clone-backups list of the project is invalidated
/// before the caller's success handler runs. On failure the caller's error
/// handler runs if set; otherwise the error is logged and the user notified.
pub struct CloneMutation {
    service: Arc<dyn PlatformService>,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
    on_success: Option<SuccessHandler>,
    on_error: Option<ErrorHandler>,
}

impl CloneMutation {
    pub fn new(
        service: Arc<dyn PlatformService>,
        cache: Arc<QueryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            service,
            cache,
            notifier,
            on_success: None,
            on_error: None,
        }
    }

    pub fn on_success(
        mut self,
        handler: impl Fn(&CloneResult, &CloneRequest) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Box::new(handler));
        self
    }

    pub fn on_error(
        mut self,
        handler: impl Fn(&ApiError, &CloneRequest) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    #[instrument(skip_all, fields(project_ref = %request.project_ref, backup_id = request.clone_backup_id))]
    pub async fn mutate(&self, request: CloneRequest) -> Result<CloneResult, ApiError> {
        match trigger_clone(self.service.as_ref(), &request).await {
            Ok(data) => {
                self.cache
                    .invalidate(&QueryKey::clone_backups(&request.project_ref));
                info!(new_project = %request.new_project_name, "clone triggered");
                if let Some(handler) = &self.on_success {
                    handler(&data, &request);
                }
                Ok(data)
            }
            Err(err) => {
                match &self.on_error {
                    Some(handler) => handler(&err, &request),
                    None => {
                        error!(?err, "failed to trigger clone");
                        self.notifier
                            .error(&format!("Failed to trigger clone: {}", err.message()));
                    }
                }
                Err(err)
            }
        }
    }

    /// Clone backups of the project, read through the query cache.
    pub async fn list_clone_backups(&self, project_ref: &str) -> Result<Vec<CloneBackup>, ApiError> {
        if project_ref.is_empty() {
            return Err(ApiError::Validation("Project ref is required"));
        }
        let service = Arc::clone(&self.service);
        let owned_ref = project_ref.to_string();
        self.cache
            .fetch(QueryKey::clone_backups(project_ref), || async move {
                service.list_clone_backups(&owned_ref).await
            })
            .await
    }
}
