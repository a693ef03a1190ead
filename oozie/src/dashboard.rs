//! Dashboard views: job listings, job and action details, job control.

use serde::Serialize;
use tracing::info;

use hue_common::{ConsoleError, ConsoleResult, RequestUser};

use crate::client::{OozieApi, RestError};
use crate::gate::check_access_and_get_job;
use crate::models::{
    Coordinator, HasStatus, JobsFilter, Workflow, WorkflowAction, RUNNING,
};

/// Map a REST failure of a dashboard call to the user-facing error.
pub fn oozie_error(err: RestError) -> ConsoleError {
    ConsoleError::upstream("Sorry, an error with Oozie happened.", err.message)
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSplit<T> {
    pub running_jobs: Vec<T>,
    pub completed_jobs: Vec<T>,
}

/// Separate running jobs from the rest, each side ordered by status.
pub fn split_jobs<T: HasStatus>(jobs: Vec<T>) -> JobSplit<T> {
    let (mut running_jobs, mut completed_jobs): (Vec<T>, Vec<T>) =
        jobs.into_iter().partition(|j| j.status() == RUNNING);
    running_jobs.sort_by(|a, b| a.status().cmp(b.status()));
    completed_jobs.sort_by(|a, b| a.status().cmp(b.status()));
    JobSplit {
        running_jobs,
        completed_jobs,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobsView<T> {
    pub user: String,
    pub jobs: JobSplit<T>,
}

/// Superusers see every job; everyone else only their own.
fn listing_filter(user: &RequestUser, jobs_count: u32) -> JobsFilter {
    JobsFilter {
        len: jobs_count,
        user: (!user.is_superuser).then(|| user.username.clone()),
    }
}

pub async fn list_workflows(
    client: &dyn OozieApi,
    user: &RequestUser,
    jobs_count: u32,
) -> ConsoleResult<JobsView<Workflow>> {
    let workflows = client
        .get_workflows(&listing_filter(user, jobs_count))
        .await
        .map_err(oozie_error)?;
    Ok(JobsView {
        user: user.username.clone(),
        jobs: split_jobs(workflows.workflows),
    })
}

pub async fn list_coordinators(
    client: &dyn OozieApi,
    user: &RequestUser,
    jobs_count: u32,
) -> ConsoleResult<JobsView<Coordinator>> {
    let coordinators = client
        .get_coordinators(&listing_filter(user, jobs_count))
        .await
        .map_err(oozie_error)?;
    Ok(JobsView {
        user: user.username.clone(),
        jobs: split_jobs(coordinators.coordinators),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowView {
    pub oozie_workflow: Workflow,
    pub oozie_coordinator: Option<Coordinator>,
}

/// A workflow, and the coordinator that launched it when one is named.
/// Both go through the access gate.
pub async fn workflow(
    client: &dyn OozieApi,
    user: &RequestUser,
    job_id: &str,
    coordinator_job_id: Option<&str>,
) -> ConsoleResult<WorkflowView> {
    let oozie_workflow = check_access_and_get_job(client, user, job_id)
        .await?
        .into_workflow()
        .ok_or_else(|| ConsoleError::invalid(format!("Not a workflow: {job_id}")))?;

    let oozie_coordinator = match coordinator_job_id {
        Some(coord_id) => Some(
            check_access_and_get_job(client, user, coord_id)
                .await?
                .into_coordinator()
                .ok_or_else(|| ConsoleError::invalid(format!("Not a coordinator: {coord_id}")))?,
        ),
        None => None,
    };

    Ok(WorkflowView {
        oozie_workflow,
        oozie_coordinator,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorView {
    pub oozie_coordinator: Coordinator,
}

pub async fn coordinator(
    client: &dyn OozieApi,
    user: &RequestUser,
    job_id: &str,
) -> ConsoleResult<CoordinatorView> {
    let oozie_coordinator = check_access_and_get_job(client, user, job_id)
        .await?
        .into_coordinator()
        .ok_or_else(|| ConsoleError::invalid(format!("Not a coordinator: {job_id}")))?;
    Ok(CoordinatorView { oozie_coordinator })
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionView {
    pub action: WorkflowAction,
    pub workflow: Workflow,
}

/// An action of a workflow; access follows the owning workflow.
pub async fn workflow_action(
    client: &dyn OozieApi,
    user: &RequestUser,
    action_id: &str,
) -> ConsoleResult<ActionView> {
    let action = client.get_action(action_id).await.map_err(|e| {
        ConsoleError::upstream(format!("Error accessing Oozie action {action_id}"), e.message)
    })?;

    let workflow_id = action.workflow_id().to_string();
    let workflow = check_access_and_get_job(client, user, &workflow_id)
        .await?
        .into_workflow()
        .ok_or_else(|| ConsoleError::invalid(format!("Not a workflow: {workflow_id}")))?;

    Ok(ActionView { action, workflow })
}

/// Outcome of a job control request. `status` is 0 on success, -1 when
/// Oozie refused; `data` holds the reply or the error text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManageResult {
    pub status: i32,
    pub data: String,
}

pub async fn manage_job(
    client: &dyn OozieApi,
    user: &RequestUser,
    job_id: &str,
    action: &str,
) -> ConsoleResult<ManageResult> {
    check_access_and_get_job(client, user, job_id).await?;

    let result = match client.job_control(job_id, action).await {
        Ok(data) => {
            info!(user = %user.username, "Action {action} was performed on job {job_id}");
            ManageResult { status: 0, data }
        }
        Err(e) => ManageResult {
            status: -1,
            data: format!("Error performing {action} on Oozie job {job_id}: {}", e.message),
        },
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{coord_job, wf_job, FakeOozie};

    fn alice() -> RequestUser {
        RequestUser::new("alice", false)
    }

    fn with_action(mut wf: Workflow, name: &str) -> Workflow {
        wf.actions.push(WorkflowAction {
            id: format!("{}@{name}", wf.id),
            name: name.into(),
            status: "OK".into(),
            ..Default::default()
        });
        wf
    }

    fn oozie() -> FakeOozie {
        FakeOozie {
            workflows: vec![
                with_action(wf_job("0001-W", "alice", "SUCCEEDED"), "hive"),
                wf_job("0002-W", "alice", "RUNNING"),
                wf_job("0003-W", "alice", "KILLED"),
                with_action(wf_job("0004-W", "bob", "RUNNING"), "pig"),
            ],
            coordinators: vec![
                coord_job("0005-C", "alice", "RUNNING"),
                coord_job("0006-C", "bob", "SUCCEEDED"),
            ],
            ..Default::default()
        }
    }

    fn ids<T: Serialize>(jobs: &[T]) -> Vec<String> {
        jobs.iter()
            .map(|j| {
                let value = serde_json::to_value(j).unwrap();
                value
                    .get("id")
                    .or_else(|| value.get("coordJobId"))
                    .and_then(|v| v.as_str())
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_split_jobs() {
        let split = split_jobs(vec![
            wf_job("1-W", "a", "SUCCEEDED"),
            wf_job("2-W", "a", "RUNNING"),
            wf_job("3-W", "a", "KILLED"),
            wf_job("4-W", "a", "FAILED"),
        ]);
        assert_eq!(ids(&split.running_jobs), vec!["2-W"]);
        assert_eq!(ids(&split.completed_jobs), vec!["4-W", "3-W", "1-W"]);
    }

    #[tokio::test]
    async fn test_list_workflows_filters_by_user() {
        let oozie = oozie();
        let view = list_workflows(&oozie, &alice(), 50).await.unwrap();
        assert_eq!(view.user, "alice");
        assert_eq!(ids(&view.jobs.running_jobs), vec!["0002-W"]);
        assert_eq!(ids(&view.jobs.completed_jobs), vec!["0003-W", "0001-W"]);

        let admin = RequestUser::new("admin", true);
        let view = list_coordinators(&oozie, &admin, 10).await.unwrap();
        assert_eq!(view.jobs.running_jobs.len() + view.jobs.completed_jobs.len(), 2);

        let filters = oozie.filters.lock().unwrap().clone();
        assert_eq!(
            filters,
            vec![
                JobsFilter { len: 50, user: Some("alice".into()) },
                JobsFilter { len: 10, user: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_listing_error_is_wrapped() {
        let oozie = FakeOozie {
            down: Some(RestError {
                status: None,
                message: "connection refused".into(),
            }),
            ..Default::default()
        };
        let err = list_workflows(&oozie, &alice(), 50).await.unwrap_err();
        assert_eq!(err.to_string(), "Sorry, an error with Oozie happened.");
    }

    #[tokio::test]
    async fn test_workflow_with_coordinator() {
        let oozie = oozie();
        let view = workflow(&oozie, &alice(), "0002-W", Some("0005-C")).await.unwrap();
        assert_eq!(view.oozie_workflow.id, "0002-W");
        assert_eq!(view.oozie_coordinator.unwrap().id, "0005-C");

        // Someone else's coordinator fails the whole view
        let err = workflow(&oozie, &alice(), "0002-W", Some("0006-C")).await.unwrap_err();
        assert!(matches!(err, ConsoleError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_coordinator_view_rejects_workflow_ids() {
        let oozie = oozie();
        assert_eq!(
            coordinator(&oozie, &alice(), "0005-C").await.unwrap().oozie_coordinator.user,
            "alice"
        );
        let err = coordinator(&oozie, &alice(), "0001-W").await.unwrap_err();
        assert_eq!(err.to_string(), "Not a coordinator: 0001-W");
    }

    #[tokio::test]
    async fn test_action_is_gated_by_its_workflow() {
        let oozie = oozie();
        let view = workflow_action(&oozie, &alice(), "0001-W@hive").await.unwrap();
        assert_eq!(view.action.name, "hive");
        assert_eq!(view.workflow.id, "0001-W");

        let err = workflow_action(&oozie, &alice(), "0004-W@pig").await.unwrap_err();
        assert!(matches!(err, ConsoleError::PermissionDenied(_)));

        let err = workflow_action(&oozie, &alice(), "0001-W@nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Error accessing Oozie action 0001-W@nope");
    }

    #[tokio::test]
    async fn test_manage_job() {
        let oozie = oozie();
        let done = manage_job(&oozie, &alice(), "0002-W", "kill").await.unwrap();
        assert_eq!(done, ManageResult { status: 0, data: String::new() });
        assert_eq!(
            oozie.controls.lock().unwrap().clone(),
            vec![("0002-W".to_string(), "kill".to_string())]
        );

        // Gate first: nothing reaches Oozie for someone else's job
        let err = manage_job(&oozie, &alice(), "0004-W", "kill").await.unwrap_err();
        assert!(matches!(err, ConsoleError::PermissionDenied(_)));
        assert_eq!(oozie.controls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_manage_job_refused() {
        let oozie = FakeOozie {
            refuse_control: Some(RestError {
                status: Some(400),
                message: "E1018: Coord Job Rerun Error".into(),
            }),
            ..oozie()
        };
        let done = manage_job(&oozie, &alice(), "0005-C", "rerun").await.unwrap();
        assert_eq!(done.status, -1);
        assert_eq!(
            done.data,
            "Error performing rerun on Oozie job 0005-C: E1018: Coord Job Rerun Error"
        );
    }
}
