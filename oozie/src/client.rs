//! Oozie REST client

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use hue_common::config::OozieConfig;

use crate::models::{Coordinator, CoordinatorList, JobsFilter, Workflow, WorkflowAction, WorkflowList};

/// Characters left unescaped in a job or action id path segment.
const ID_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'@');

/// Header carrying the server's explanation of a failed call.
pub const ERROR_HEADER: &str = "oozie-error-message";

/// A failed call to the Oozie server.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RestError {
    /// HTTP status, absent when the server could not be reached.
    pub status: Option<u16>,
    pub message: String,
}

impl From<reqwest::Error> for RestError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Calls the dashboard makes against Oozie.
#[axum::async_trait]
pub trait OozieApi: Send + Sync {
    async fn get_job(&self, job_id: &str) -> Result<Workflow, RestError>;

    async fn get_coordinator(&self, job_id: &str) -> Result<Coordinator, RestError>;

    async fn get_workflows(&self, filter: &JobsFilter) -> Result<WorkflowList, RestError>;

    async fn get_coordinators(&self, filter: &JobsFilter) -> Result<CoordinatorList, RestError>;

    async fn get_action(&self, action_id: &str) -> Result<WorkflowAction, RestError>;

    /// Run `action` (start, suspend, resume, kill, ...) on a job and return
    /// the server's reply.
    async fn job_control(&self, job_id: &str, action: &str) -> Result<String, RestError>;
}

/// Oozie v1 REST API client
pub struct OozieClient {
    client: reqwest::Client,
    base_url: String,
    /// Sent as `user.name` on every call.
    service_user: String,
}

impl OozieClient {
    pub fn new(config: &OozieConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_user: config.service_user.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    fn job_path(id: &str) -> String {
        format!("job/{}", utf8_percent_encode(id, ID_SAFE))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, RestError> {
        debug!("GET {path} {params:?}");
        let response = self
            .client
            .get(self.url(path))
            .query(&[("user.name", self.service_user.as_str())])
            .query(params)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        jobtype: &str,
        filter: &JobsFilter,
    ) -> Result<T, RestError> {
        let mut params = vec![
            ("jobtype", jobtype.to_string()),
            ("len", filter.len.to_string()),
        ];
        if let Some(user) = &filter.user {
            params.push(("filter", format!("user={user}")));
        }
        self.get("jobs", &params).await
    }
}

/// Turn an unsuccessful response into a [`RestError`], preferring the
/// server's error header over the body.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header = response
        .headers()
        .get(ERROR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let message = match header {
        Some(message) => message,
        None => {
            let body = response.text().await.unwrap_or_default();
            format!("Oozie returned {status}: {body}")
        }
    };
    Err(RestError {
        status: Some(status.as_u16()),
        message,
    })
}

fn show_info() -> [(&'static str, String); 1] {
    [("show", "info".to_string())]
}

#[axum::async_trait]
impl OozieApi for OozieClient {
    async fn get_job(&self, job_id: &str) -> Result<Workflow, RestError> {
        self.get(&Self::job_path(job_id), &show_info()).await
    }

    async fn get_coordinator(&self, job_id: &str) -> Result<Coordinator, RestError> {
        self.get(&Self::job_path(job_id), &show_info()).await
    }

    async fn get_workflows(&self, filter: &JobsFilter) -> Result<WorkflowList, RestError> {
        self.list("wf", filter).await
    }

    async fn get_coordinators(&self, filter: &JobsFilter) -> Result<CoordinatorList, RestError> {
        self.list("coord", filter).await
    }

    async fn get_action(&self, action_id: &str) -> Result<WorkflowAction, RestError> {
        self.get(&Self::job_path(action_id), &show_info()).await
    }

    async fn job_control(&self, job_id: &str, action: &str) -> Result<String, RestError> {
        let response = self
            .client
            .put(self.url(&Self::job_path(job_id)))
            .query(&[("user.name", self.service_user.as_str()), ("action", action)])
            .send()
            .await?;
        Ok(check(response).await?.text().await?)
    }
}
