//! Ownership gate in front of every job detail and job control view.
//!
//! A workflow or coordinator can be accessed only by its owner or an
//! application superuser.

use hue_common::audit::access_warn;
use hue_common::{ConsoleError, ConsoleResult, RequestUser};

use crate::client::OozieApi;
use crate::models::{is_workflow_id, OozieJob};

/// Fetch `job_id` and check that `user` may see it.
pub async fn check_access_and_get_job(
    client: &dyn OozieApi,
    user: &RequestUser,
    job_id: &str,
) -> ConsoleResult<OozieJob> {
    let fetched = if is_workflow_id(job_id) {
        client.get_job(job_id).await.map(OozieJob::Workflow)
    } else {
        client.get_coordinator(job_id).await.map(OozieJob::Coordinator)
    };
    let job = fetched.map_err(|e| {
        ConsoleError::upstream(format!("Error accessing Oozie job {job_id}"), e.message)
    })?;

    if user.is_superuser || job.user() == user.username {
        return Ok(job);
    }

    let message = format!(
        "Permission denied. {} don't have the permissions to access job {}",
        user.username,
        job.id()
    );
    access_warn(user, job.id(), &message);
    Err(ConsoleError::PermissionDenied(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RestError;
    use crate::fake::{coord_job, wf_job, FakeOozie};
    use hue_common::audit::ACCESS_TARGET;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts warn-level events on the access target.
    struct AccessCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for AccessCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let meta = event.metadata();
            if meta.target() == ACCESS_TARGET && *meta.level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn oozie() -> FakeOozie {
        FakeOozie {
            workflows: vec![wf_job("0001-W", "alice", "RUNNING")],
            coordinators: vec![coord_job("0002-C", "alice", "RUNNING")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_owner_and_superuser_pass() {
        let oozie = oozie();
        let alice = RequestUser::new("alice", false);
        let admin = RequestUser::new("admin", true);

        let job = check_access_and_get_job(&oozie, &alice, "0001-W").await.unwrap();
        assert!(matches!(job, OozieJob::Workflow(_)));

        let job = check_access_and_get_job(&oozie, &admin, "0002-C").await.unwrap();
        assert!(matches!(job, OozieJob::Coordinator(_)));
    }

    #[tokio::test]
    async fn test_stranger_is_denied_and_audited_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(AccessCounter(count.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let bob = RequestUser::new("bob", false);
        let err = check_access_and_get_job(&oozie(), &bob, "0001-W")
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::PermissionDenied(_)));
        assert_eq!(
            err.to_string(),
            "Permission denied. bob don't have the permissions to access job 0001-W"
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_id_suffix_picks_the_lookup() {
        // A coordinator id is never looked up as a workflow
        let oozie = oozie();
        let alice = RequestUser::new("alice", false);
        let err = check_access_and_get_job(&oozie, &alice, "0002-W").await.unwrap_err();
        assert_eq!(err.to_string(), "Error accessing Oozie job 0002-W");
    }

    #[tokio::test]
    async fn test_rest_error_is_upstream() {
        let oozie = FakeOozie {
            down: Some(RestError {
                status: Some(500),
                message: "E0501: Could not perform authorization".into(),
            }),
            ..oozie()
        };
        let alice = RequestUser::new("alice", false);
        match check_access_and_get_job(&oozie, &alice, "0001-W").await {
            Err(ConsoleError::Upstream { message, detail }) => {
                assert_eq!(message, "Error accessing Oozie job 0001-W");
                assert!(detail.starts_with("E0501"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
