//! Oozie job records as returned by the v1 REST API.
//!
//! Timestamps are kept as the server renders them (RFC 1123 strings).

use serde::{Deserialize, Serialize};

pub const RUNNING: &str = "RUNNING";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Workflow {
    pub id: String,
    pub app_name: String,
    pub app_path: Option<String>,
    pub user: String,
    pub group: Option<String>,
    pub status: String,
    pub created_time: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub last_mod_time: Option<String>,
    pub run: u32,
    /// Job configuration, an XML document.
    pub conf: Option<String>,
    pub console_url: Option<String>,
    pub parent_id: Option<String>,
    pub actions: Vec<WorkflowAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowAction {
    /// `<workflow id>@<action name>`
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub status: String,
    pub external_id: Option<String>,
    pub external_status: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub transition: Option<String>,
    pub console_url: Option<String>,
    pub tracker_uri: Option<String>,
    pub retries: u32,
    pub conf: Option<String>,
}

impl WorkflowAction {
    /// Id of the workflow this action belongs to.
    pub fn workflow_id(&self) -> &str {
        self.id.split('@').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Coordinator {
    #[serde(rename = "coordJobId")]
    pub id: String,
    #[serde(rename = "coordJobName")]
    pub app_name: String,
    #[serde(rename = "coordJobPath")]
    pub app_path: Option<String>,
    pub user: String,
    pub group: Option<String>,
    pub status: String,
    /// A number in older servers, a cron expression in newer ones.
    pub frequency: Option<serde_json::Value>,
    pub time_unit: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub next_materialized_time: Option<String>,
    pub concurrency: Option<i64>,
    pub conf: Option<String>,
    pub console_url: Option<String>,
    pub actions: Vec<CoordinatorAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoordinatorAction {
    pub id: String,
    pub job_id: Option<String>,
    pub action_number: u32,
    pub status: String,
    /// Id of the workflow materialized for this action.
    pub external_id: Option<String>,
    pub created_time: Option<String>,
    pub nominal_time: Option<String>,
    pub last_modified_time: Option<String>,
    pub missing_dependencies: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub console_url: Option<String>,
}

/// A job fetched by id: workflow ids end in `W`, anything else is a
/// coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OozieJob {
    Workflow(Workflow),
    Coordinator(Coordinator),
}

impl OozieJob {
    pub fn id(&self) -> &str {
        match self {
            Self::Workflow(w) => &w.id,
            Self::Coordinator(c) => &c.id,
        }
    }

    pub fn user(&self) -> &str {
        match self {
            Self::Workflow(w) => &w.user,
            Self::Coordinator(c) => &c.user,
        }
    }

    pub fn into_workflow(self) -> Option<Workflow> {
        match self {
            Self::Workflow(w) => Some(w),
            Self::Coordinator(_) => None,
        }
    }

    pub fn into_coordinator(self) -> Option<Coordinator> {
        match self {
            Self::Coordinator(c) => Some(c),
            Self::Workflow(_) => None,
        }
    }
}

pub fn is_workflow_id(job_id: &str) -> bool {
    job_id.ends_with('W')
}

/// Anything with an Oozie status.
pub trait HasStatus {
    fn status(&self) -> &str;
}

impl HasStatus for Workflow {
    fn status(&self) -> &str {
        &self.status
    }
}

impl HasStatus for Coordinator {
    fn status(&self) -> &str {
        &self.status
    }
}

/// Response of `GET /v1/jobs?jobtype=wf`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowList {
    pub workflows: Vec<Workflow>,
    pub total: u64,
}

/// Response of `GET /v1/jobs?jobtype=coord`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoordinatorList {
    #[serde(rename = "coordinatorjobs")]
    pub coordinators: Vec<Coordinator>,
    pub total: u64,
}

/// Which jobs a listing asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobsFilter {
    pub len: u32,
    /// Restrict to jobs of this user.
    pub user: Option<String>,
}
