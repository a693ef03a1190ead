//! In-memory Oozie for the unit tests.

use std::sync::Mutex;

use crate::client::{OozieApi, RestError};
use crate::models::{
    Coordinator, CoordinatorList, JobsFilter, Workflow, WorkflowAction, WorkflowList,
};

#[derive(Default)]
pub struct FakeOozie {
    pub workflows: Vec<Workflow>,
    pub coordinators: Vec<Coordinator>,
    /// Every call fails with this error when set.
    pub down: Option<RestError>,
    /// `job_control` fails with this error when set.
    pub refuse_control: Option<RestError>,
    pub filters: Mutex<Vec<JobsFilter>>,
    pub controls: Mutex<Vec<(String, String)>>,
}

pub fn wf_job(id: &str, user: &str, status: &str) -> Workflow {
    Workflow {
        id: id.into(),
        app_name: format!("app-{id}"),
        user: user.into(),
        status: status.into(),
        ..Default::default()
    }
}

pub fn coord_job(id: &str, user: &str, status: &str) -> Coordinator {
    Coordinator {
        id: id.into(),
        app_name: format!("coord-{id}"),
        user: user.into(),
        status: status.into(),
        ..Default::default()
    }
}

fn missing(id: &str) -> RestError {
    RestError {
        status: Some(404),
        message: format!("E0604: Job does not exist [{id}]"),
    }
}

fn keep(user: &Option<String>, owner: &str) -> bool {
    user.as_deref().map_or(true, |u| u == owner)
}

impl FakeOozie {
    fn reachable(&self) -> Result<(), RestError> {
        match &self.down {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[axum::async_trait]
impl OozieApi for FakeOozie {
    async fn get_job(&self, job_id: &str) -> Result<Workflow, RestError> {
        self.reachable()?;
        self.workflows
            .iter()
            .find(|w| w.id == job_id)
            .cloned()
            .ok_or_else(|| missing(job_id))
    }

    async fn get_coordinator(&self, job_id: &str) -> Result<Coordinator, RestError> {
        self.reachable()?;
        self.coordinators
            .iter()
            .find(|c| c.id == job_id)
            .cloned()
            .ok_or_else(|| missing(job_id))
    }

    async fn get_workflows(&self, filter: &JobsFilter) -> Result<WorkflowList, RestError> {
        self.reachable()?;
        self.filters.lock().unwrap().push(filter.clone());
        let workflows: Vec<Workflow> = self
            .workflows
            .iter()
            .filter(|w| keep(&filter.user, &w.user))
            .take(filter.len as usize)
            .cloned()
            .collect();
        Ok(WorkflowList {
            total: workflows.len() as u64,
            workflows,
        })
    }

    async fn get_coordinators(&self, filter: &JobsFilter) -> Result<CoordinatorList, RestError> {
        self.reachable()?;
        self.filters.lock().unwrap().push(filter.clone());
        let coordinators: Vec<Coordinator> = self
            .coordinators
            .iter()
            .filter(|c| keep(&filter.user, &c.user))
            .take(filter.len as usize)
            .cloned()
            .collect();
        Ok(CoordinatorList {
            total: coordinators.len() as u64,
            coordinators,
        })
    }

    async fn get_action(&self, action_id: &str) -> Result<WorkflowAction, RestError> {
        self.reachable()?;
        self.workflows
            .iter()
            .flat_map(|w| w.actions.iter())
            .find(|a| a.id == action_id)
            .cloned()
            .ok_or_else(|| missing(action_id))
    }

    async fn job_control(&self, job_id: &str, action: &str) -> Result<String, RestError> {
        self.reachable()?;
        if let Some(err) = &self.refuse_control {
            return Err(err.clone());
        }
        self.controls
            .lock()
            .unwrap()
            .push((job_id.to_string(), action.to_string()));
        Ok(String::new())
    }
}
