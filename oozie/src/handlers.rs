//! HTTP handlers of the Oozie dashboard, mounted under `/oozie`.

use axum::extract::{FromRef, Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;

use hue_common::config::{AuthConfig, OozieConfig};
use hue_common::{ConsoleResult, RequestUser};

use crate::client::OozieApi;
use crate::dashboard::{
    self, ActionView, CoordinatorView, JobsView, ManageResult, WorkflowView,
};
use crate::models::{Coordinator, Workflow};

/// Shared state of the dashboard routes.
#[derive(Clone)]
pub struct DashboardState {
    pub client: Arc<dyn OozieApi>,
    pub settings: Arc<OozieConfig>,
    pub auth: AuthConfig,
}

impl FromRef<DashboardState> for AuthConfig {
    fn from_ref(state: &DashboardState) -> Self {
        state.auth.clone()
    }
}

/// Build the `/oozie` router.
pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/list_oozie_workflows", get(list_workflows))
        .route("/list_oozie_coordinators", get(list_coordinators))
        .route("/list_oozie_workflow/:job_id", get(workflow))
        .route("/list_oozie_coordinator/:job_id", get(coordinator))
        .route("/list_oozie_workflow_action/:action_id", get(workflow_action))
        .route("/manage_oozie_jobs/:job_id/:action", post(manage_job))
        .with_state(state)
}

async fn list_workflows(
    State(state): State<DashboardState>,
    user: RequestUser,
) -> ConsoleResult<Json<JobsView<Workflow>>> {
    let view =
        dashboard::list_workflows(state.client.as_ref(), &user, state.settings.jobs_count).await?;
    Ok(Json(view))
}

async fn list_coordinators(
    State(state): State<DashboardState>,
    user: RequestUser,
) -> ConsoleResult<Json<JobsView<Coordinator>>> {
    let view =
        dashboard::list_coordinators(state.client.as_ref(), &user, state.settings.jobs_count)
            .await?;
    Ok(Json(view))
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowQuery {
    pub coordinator_job_id: Option<String>,
}

async fn workflow(
    State(state): State<DashboardState>,
    user: RequestUser,
    Path(job_id): Path<String>,
    Query(query): Query<WorkflowQuery>,
) -> ConsoleResult<Json<WorkflowView>> {
    let coordinator_job_id = query
        .coordinator_job_id
        .as_deref()
        .filter(|id| !id.is_empty());
    let view =
        dashboard::workflow(state.client.as_ref(), &user, &job_id, coordinator_job_id).await?;
    Ok(Json(view))
}

async fn coordinator(
    State(state): State<DashboardState>,
    user: RequestUser,
    Path(job_id): Path<String>,
) -> ConsoleResult<Json<CoordinatorView>> {
    Ok(Json(
        dashboard::coordinator(state.client.as_ref(), &user, &job_id).await?,
    ))
}

async fn workflow_action(
    State(state): State<DashboardState>,
    user: RequestUser,
    Path(action_id): Path<String>,
) -> ConsoleResult<Json<ActionView>> {
    Ok(Json(
        dashboard::workflow_action(state.client.as_ref(), &user, &action_id).await?,
    ))
}

async fn manage_job(
    State(state): State<DashboardState>,
    user: RequestUser,
    Path((job_id, action)): Path<(String, String)>,
) -> ConsoleResult<Json<ManageResult>> {
    Ok(Json(
        dashboard::manage_job(state.client.as_ref(), &user, &job_id, &action).await?,
    ))
}
