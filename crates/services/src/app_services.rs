use std::sync::Arc;

use learn_core::model::ScoreThresholds;
use storage::repository::Storage;

use crate::Clock;
use crate::api::{ApiClient, HttpBackend};
use crate::auth::{AuthClient, SessionHandle};
use crate::config::{ApiConfig, GraderConfig};
use crate::controller::CourseProgressionController;
use crate::dashboard::{CourseDashboards, RemoteDashboards, StoredDashboards};
use crate::error::AppServicesError;
use crate::evaluator::{AssignmentEvaluator, HttpAssignmentEvaluator};
use crate::progress_store::ProgressStore;

/// Assembles the progression controller over a chosen storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    controller: Arc<CourseProgressionController>,
    dashboards: Arc<dyn CourseDashboards>,
    auth: Option<AuthClient>,
}

impl AppServices {
    /// Wire the controller over an existing `Storage`.
    #[must_use]
    pub fn from_storage(
        storage: Storage,
        evaluator: Arc<dyn AssignmentEvaluator>,
        clock: Clock,
        thresholds: ScoreThresholds,
    ) -> Self {
        let progress = ProgressStore::new(clock, Arc::clone(&storage.progress));
        let controller = CourseProgressionController::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.ratings),
            progress,
            evaluator,
        )
        .with_thresholds(thresholds);
        let dashboards: Arc<dyn CourseDashboards> = Arc::new(StoredDashboards::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.progress),
        ));
        Self {
            storage,
            controller: Arc::new(controller),
            dashboards,
            auth: None,
        }
    }

    /// Build services backed by `SQLite`, grading through the course API.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// grader client cannot be built.
    pub async fn new_sqlite(
        db_url: &str,
        api: &ApiConfig,
        grader: &GraderConfig,
        clock: Clock,
        thresholds: ScoreThresholds,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let session = SessionHandle::new();
        let evaluator = http_evaluator(ApiClient::new(api, session.clone())?, grader)?;
        let mut services = Self::from_storage(storage, evaluator, clock, thresholds);
        services.auth = Some(AuthClient::new(api, session)?);
        Ok(services)
    }

    /// Build services where courses, enrollment and progress all live behind
    /// the remote course API.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the HTTP clients cannot be built.
    pub fn new_remote(
        api: &ApiConfig,
        grader: &GraderConfig,
        session: SessionHandle,
        clock: Clock,
        thresholds: ScoreThresholds,
    ) -> Result<Self, AppServicesError> {
        let client = ApiClient::new(api, session.clone())?;
        let storage = HttpBackend::new(client.clone()).into_storage();
        let dashboards = Arc::new(RemoteDashboards::new(client.clone()));
        let evaluator = http_evaluator(client, grader)?;
        let mut services = Self::from_storage(storage, evaluator, clock, thresholds);
        services.dashboards = dashboards;
        services.auth = Some(AuthClient::new(api, session)?);
        Ok(services)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn controller(&self) -> Arc<CourseProgressionController> {
        Arc::clone(&self.controller)
    }

    /// Leaderboards and lesson aggregates. Computed locally over stored
    /// progress, or by the server for remote services.
    #[must_use]
    pub fn dashboards(&self) -> Arc<dyn CourseDashboards> {
        Arc::clone(&self.dashboards)
    }

    /// Login client sharing the session of the HTTP collaborators.
    #[must_use]
    pub fn auth(&self) -> Option<&AuthClient> {
        self.auth.as_ref()
    }
}

fn http_evaluator(
    client: ApiClient,
    grader: &GraderConfig,
) -> Result<Arc<dyn AssignmentEvaluator>, AppServicesError> {
    let evaluator = HttpAssignmentEvaluator::with_config(client, grader)?;
    Ok(Arc::new(evaluator))
}
