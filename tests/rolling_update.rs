// ABOUTME: Integration tests for the rolling-update orchestrator against the mock engine.
// ABOUTME: Covers preconditions, no-op pulls, partial failure with rollback, commit, and retries.

mod support;

use reimage::diagnostics::WarningKind;
use reimage::retry::RetryPolicy;
use reimage::runtime::mock::{Call, MockRuntime, PullBehavior, sample_container};
use reimage::update::{
    PreconditionError, Step, TaskOutcome, UpdateError, UpdateOutcome, UpdateReport,
    UpdateSettings, Updater,
};
use reimage::types::ImageId;
use std::time::Duration;
use support::{TAG, host, tag};

fn settings(retries: u32) -> UpdateSettings {
    UpdateSettings {
        retry: RetryPolicy::new(retries, Duration::ZERO),
        prune: None,
        include_stopped: true,
    }
}

fn updated(outcome: UpdateOutcome) -> UpdateReport {
    match outcome {
        UpdateOutcome::Updated(report) => report,
        other => panic!("expected an update, got {other:?}"),
    }
}

fn incomplete(err: UpdateError) -> UpdateReport {
    match err {
        UpdateError::Incomplete(report) => *report,
        other => panic!("expected an incomplete update, got {other:?}"),
    }
}

fn is_container_mutation(call: &Call) -> bool {
    matches!(
        call,
        Call::RemoveContainer(_) | Call::Create(_) | Call::Start(_) | Call::RemoveImage(_)
    )
}

mod full_success {
    use super::*;

    #[tokio::test]
    async fn every_container_runs_from_new_image() {
        let h = host(&["web", "worker", "cache"]);

        let report = updated(
            Updater::new(h.mock.clone(), settings(0))
                .update_image(&tag())
                .await
                .unwrap(),
        );

        assert_eq!(report.total(), 3);
        assert_eq!(report.replaced(), 3);
        assert!(report.is_complete());
        assert!(report.old_image_removed);
        assert!(report.warnings.is_empty());
        assert!(!h.mock.has_image(&h.old));

        let containers = h.mock.containers();
        assert_eq!(containers.len(), 3);
        for container in &containers {
            assert_eq!(container.image, h.new.to_string());
            assert!(container.running);
        }
    }

    #[tokio::test]
    async fn configuration_and_networking_survive() {
        let h = host(&["web"]);
        let before = h.mock.container_named("web").unwrap();

        Updater::new(h.mock.clone(), settings(0))
            .update_image(&tag())
            .await
            .unwrap();

        let after = h.mock.container_named("web").unwrap();
        assert_ne!(after.id, before.id);
        assert_eq!(after.networks, before.networks);
        assert_eq!(after.mac_address, before.mac_address);
        assert_eq!(after.host_config, before.host_config);

        let (old_config, new_config) = (before.config.unwrap(), after.config.unwrap());
        assert_eq!(new_config.env, old_config.env);
        assert_eq!(new_config.cmd, old_config.cmd);
        assert_eq!(new_config.labels, old_config.labels);
    }

    #[tokio::test]
    async fn stopped_containers_are_recreated_but_not_started() {
        let h = host(&["web"]);
        h.mock
            .add_container(sample_container("c9", "batch", &h.old, false));

        let report = updated(
            Updater::new(h.mock.clone(), settings(0))
                .update_image(&tag())
                .await
                .unwrap(),
        );

        assert_eq!(report.replaced(), 2);
        let batch = h.mock.container_named("batch").unwrap();
        assert_eq!(batch.image, h.new.to_string());
        assert!(!batch.running);
        assert_eq!(h.mock.count(|c| matches!(c, Call::Start(_))), 1);
    }

    #[tokio::test]
    async fn containers_of_derived_images_are_left_alone() {
        let h = host(&["web"]);
        let derived = h
            .mock
            .add_derived_image("sha256:derived", &["local/app:dev"], &h.old);
        let dev = h
            .mock
            .add_container(sample_container("d0", "dev", &derived, true));

        let report = updated(
            Updater::new(h.mock.clone(), settings(0))
                .update_image(&tag())
                .await
                .unwrap(),
        );

        assert_eq!(report.total(), 1);
        assert_eq!(report.replaced(), 1);
        let untouched = h.mock.container_named("dev").unwrap();
        assert_eq!(untouched.id, dev);
        assert_eq!(untouched.image, derived.to_string());
        assert!(untouched.running);
        assert_eq!(
            h.mock
                .count(|c| matches!(c, Call::RemoveContainer(id) if *id == dev)),
            0
        );

        assert!(!report.old_image_removed);
        assert!(h.mock.has_image(&h.old));
        assert_eq!(report.warnings[0].kind, WarningKind::ImageRemoval);
    }

    #[tokio::test]
    async fn prune_runs_after_commit_when_enabled() {
        let h = host(&["web"]);
        h.mock.add_image("sha256:dangling", &[]);

        let report = updated(
            Updater::new(
                h.mock.clone(),
                UpdateSettings {
                    prune: Some(RetryPolicy::new(1, Duration::ZERO)),
                    ..settings(0)
                },
            )
            .update_image(&tag())
            .await
            .unwrap(),
        );

        let pruned = report.pruned.unwrap();
        assert_eq!(pruned.deleted, vec!["sha256:dangling".to_string()]);
        assert!(!h.mock.has_image(&ImageId::new("sha256:dangling")));
    }
}

mod preconditions {
    use super::*;

    #[tokio::test]
    async fn unknown_tag_changes_nothing() {
        let mock = MockRuntime::new();

        let err = Updater::new(mock.clone(), settings(0))
            .update_image(&tag())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UpdateError::Precondition(PreconditionError::ImageNotFound { .. })
        ));
        assert!(mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn ambiguous_tag_changes_nothing() {
        let h = host(&["web"]);
        h.mock.add_image("sha256:other", &[TAG]);

        let err = Updater::new(h.mock.clone(), settings(0))
            .update_image(&tag())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UpdateError::Precondition(PreconditionError::AmbiguousImage { found: 2, .. })
        ));
        assert!(h.mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn image_without_containers_changes_nothing() {
        let h = host(&[]);

        let err = Updater::new(h.mock.clone(), settings(0))
            .update_image(&tag())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UpdateError::Precondition(PreconditionError::NoContainers { .. })
        ));
        assert!(h.mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn listing_failure_after_retries_changes_nothing() {
        let h = host(&["web"]);
        h.mock.fail_always(|c| matches!(c, Call::ListImages(_)));

        let err = Updater::new(h.mock.clone(), settings(2))
            .update_image(&tag())
            .await
            .unwrap_err();

        match err {
            UpdateError::Engine(e) => assert_eq!(e.step(), Step::ListImages),
            other => panic!("expected engine error, got {other:?}"),
        }
        assert_eq!(h.mock.count(|c| matches!(c, Call::ListImages(_))), 3);
        assert!(h.mock.mutating_calls().is_empty());
    }
}

mod pull {
    use super::*;

    #[tokio::test]
    async fn up_to_date_is_a_no_op() {
        let h = host(&["web", "worker"]);
        h.mock.set_pull(PullBehavior::UpToDate);

        let outcome = Updater::new(h.mock.clone(), settings(0))
            .update_image(&tag())
            .await
            .unwrap();

        match outcome {
            UpdateOutcome::AlreadyCurrent { image, .. } => assert_eq!(image, h.old),
            other => panic!("expected no-op, got {other:?}"),
        }
        assert_eq!(h.mock.count(is_container_mutation), 0);
        assert!(h.mock.has_image(&h.old));
    }

    #[tokio::test]
    async fn failed_pull_leaves_containers_alone() {
        let h = host(&["web"]);
        h.mock.set_pull(PullBehavior::Missing);

        let err = Updater::new(h.mock.clone(), settings(1))
            .update_image(&tag())
            .await
            .unwrap_err();

        match err {
            UpdateError::Engine(e) => {
                assert_eq!(e.step(), Step::Pull);
                assert!(!e.is_critical());
            }
            other => panic!("expected engine error, got {other:?}"),
        }
        assert_eq!(h.mock.count(|c| matches!(c, Call::Pull(_))), 2);
        assert_eq!(h.mock.count(is_container_mutation), 0);
    }
}

mod partial_failure {
    use super::*;

    #[tokio::test]
    async fn failed_create_is_rolled_back_and_old_image_kept() {
        let h = host(&["web", "worker", "cache"]);
        h.mock
            .fail_times(1, |c| matches!(c, Call::Create(name) if name == "worker"));

        let report = incomplete(
            Updater::new(h.mock.clone(), settings(0))
                .update_image(&tag())
                .await
                .unwrap_err(),
        );

        assert_eq!(report.replaced(), 2);
        assert_eq!(report.rolled_back(), 1);
        assert_eq!(report.rollback_failed(), 0);
        assert!(!report.old_image_removed);
        assert!(h.mock.has_image(&h.old));
        assert_eq!(h.mock.count(|c| matches!(c, Call::RemoveImage(_))), 0);

        let worker = h.mock.container_named("worker").unwrap();
        assert_eq!(worker.image, h.old.to_string());
        assert!(worker.running);
        assert_eq!(
            h.mock.container_named("web").unwrap().image,
            h.new.to_string()
        );
    }

    #[tokio::test]
    async fn failed_rollback_is_distinguishable() {
        let h = host(&["web", "worker"]);
        h.mock
            .fail_always(|c| matches!(c, Call::Create(name) if name == "worker"));

        let report = incomplete(
            Updater::new(h.mock.clone(), settings(0))
                .update_image(&tag())
                .await
                .unwrap_err(),
        );

        assert_eq!(report.replaced(), 1);
        assert_eq!(report.rolled_back(), 0);
        assert_eq!(report.rollback_failed(), 1);
        let task = report
            .tasks
            .iter()
            .find(|t| t.container == "worker")
            .unwrap();
        assert_eq!(task.outcome, TaskOutcome::RollbackFailed);
        assert!(task.error.is_some());
        assert!(task.rollback_error.is_some());
        assert!(h.mock.container_named("worker").is_none());
        assert!(h.mock.has_image(&h.old));
    }

    #[tokio::test]
    async fn failed_start_removes_half_created_replacement() {
        let h = host(&["web", "worker"]);
        h.mock.fail_times(1, |c| matches!(c, Call::Start(_)));

        let report = incomplete(
            Updater::new(h.mock.clone(), settings(0))
                .update_image(&tag())
                .await
                .unwrap_err(),
        );

        assert_eq!(report.replaced(), 1);
        assert_eq!(report.rolled_back(), 1);

        let containers = h.mock.containers();
        assert_eq!(containers.len(), 2);
        assert_eq!(
            containers
                .iter()
                .filter(|c| c.image == h.old.to_string())
                .count(),
            1
        );
        assert!(containers.iter().all(|c| c.running));
    }

    #[tokio::test]
    async fn failed_removal_leaves_container_intact() {
        let h = host(&["web", "worker"]);
        let worker = h.mock.container_named("worker").unwrap();
        let worker_id = worker.id.clone();
        h.mock
            .fail_always(move |c| matches!(c, Call::RemoveContainer(id) if *id == worker_id));

        let report = incomplete(
            Updater::new(h.mock.clone(), settings(1))
                .update_image(&tag())
                .await
                .unwrap_err(),
        );

        assert_eq!(report.replaced(), 1);
        assert_eq!(report.intact(), 1);
        assert_eq!(report.rolled_back(), 0);
        let still_there = h.mock.container_named("worker").unwrap();
        assert_eq!(still_there.id, worker.id);
        assert_eq!(still_there.image, h.old.to_string());
        assert_eq!(h.mock.count(|c| matches!(c, Call::Create(name) if name == "worker")), 0);
    }

    #[tokio::test]
    async fn incomplete_error_summarizes_counts() {
        let h = host(&["web", "worker"]);
        h.mock
            .fail_times(1, |c| matches!(c, Call::Create(name) if name == "web"));

        let err = Updater::new(h.mock.clone(), settings(0))
            .update_image(&tag())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("1 of 2"), "{message}");
        assert!(message.contains("1 rolled back"), "{message}");
        assert!(err.report().is_some());
    }
}

mod lost_responses {
    use super::*;
    use async_trait::async_trait;
    use reimage::runtime::{
        ContainerError, ContainerFilters, ContainerOps, ContainerRecord, ContainerSpec,
        ImageError, ImageOps, ImageRecord, InspectedContainer, PruneReport, PullStream,
    };
    use reimage::types::{ContainerId, ImageRef};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Engine whose first container removal takes effect but whose reply
    /// never arrives.
    struct DropsFirstRemoveReply {
        inner: MockRuntime,
        dropped: AtomicBool,
    }

    #[async_trait]
    impl ImageOps for DropsFirstRemoveReply {
        async fn list_images(&self, reference: &ImageRef) -> Result<Vec<ImageRecord>, ImageError> {
            self.inner.list_images(reference).await
        }

        fn pull_image(&self, reference: &ImageRef) -> PullStream {
            self.inner.pull_image(reference)
        }

        async fn remove_image(&self, id: &ImageId) -> Result<(), ImageError> {
            self.inner.remove_image(id).await
        }

        async fn prune_images(&self) -> Result<PruneReport, ImageError> {
            self.inner.prune_images().await
        }
    }

    #[async_trait]
    impl ContainerOps for DropsFirstRemoveReply {
        async fn list_containers(
            &self,
            filters: &ContainerFilters,
        ) -> Result<Vec<ContainerRecord>, ContainerError> {
            self.inner.list_containers(filters).await
        }

        async fn inspect_container(
            &self,
            id: &ContainerId,
        ) -> Result<InspectedContainer, ContainerError> {
            self.inner.inspect_container(id).await
        }

        async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
            self.inner.remove_container(id, force).await?;
            if self.dropped.swap(true, Ordering::SeqCst) {
                Ok(())
            } else {
                Err(ContainerError::Runtime("connection reset".to_string()))
            }
        }

        async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError> {
            self.inner.create_container(spec).await
        }

        async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
            self.inner.start_container(id).await
        }
    }

    #[tokio::test]
    async fn removal_whose_reply_was_lost_still_replaces() {
        let h = host(&["web"]);
        let runtime = DropsFirstRemoveReply {
            inner: h.mock.clone(),
            dropped: AtomicBool::new(false),
        };

        let report = updated(
            Updater::new(runtime, settings(1))
                .update_image(&tag())
                .await
                .unwrap(),
        );

        assert_eq!(report.replaced(), 1);
        assert_eq!(report.tasks[0].outcome, TaskOutcome::Replaced);
        let web = h.mock.container_named("web").unwrap();
        assert_eq!(web.image, h.new.to_string());
        assert!(web.running);
        assert_eq!(h.mock.count(|c| matches!(c, Call::RemoveContainer(_))), 2);
    }
}

mod commit {
    use super::*;

    #[tokio::test]
    async fn old_image_removal_failure_is_a_warning() {
        let h = host(&["web"]);
        h.mock.fail_always(|c| matches!(c, Call::RemoveImage(_)));

        let report = updated(
            Updater::new(h.mock.clone(), settings(1))
                .update_image(&tag())
                .await
                .unwrap(),
        );

        assert!(report.is_complete());
        assert!(!report.old_image_removed);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(h.mock.count(|c| matches!(c, Call::RemoveImage(_))), 2);
    }

    #[tokio::test]
    async fn prune_failure_is_a_warning_after_one_retry() {
        let h = host(&["web"]);
        h.mock.fail_always(|c| matches!(c, Call::Prune));

        let report = updated(
            Updater::new(
                h.mock.clone(),
                UpdateSettings {
                    prune: Some(RetryPolicy::new(1, Duration::ZERO)),
                    ..settings(3)
                },
            )
            .update_image(&tag())
            .await
            .unwrap(),
        );

        assert!(report.old_image_removed);
        assert!(report.pruned.is_none());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(h.mock.count(|c| matches!(c, Call::Prune)), 2);
    }
}

mod retries {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn transient_failures_are_absorbed() {
        let h = host(&["web"]);
        h.mock.fail_times(2, |c| matches!(c, Call::ListImages(_)));
        h.mock.fail_times(1, |c| matches!(c, Call::Inspect(_)));
        h.mock.fail_times(2, |c| matches!(c, Call::Create(_)));

        let report = updated(
            Updater::new(h.mock.clone(), settings(3))
                .update_image(&tag())
                .await
                .unwrap(),
        );

        assert_eq!(report.replaced(), 1);
        assert_eq!(h.mock.count(|c| matches!(c, Call::Create(_))), 3);
        assert_eq!(h.mock.count(|c| matches!(c, Call::Inspect(_))), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_wait_between_attempts() {
        let h = host(&["web"]);
        h.mock.fail_times(2, |c| matches!(c, Call::Create(_)));
        let start = Instant::now();

        Updater::new(
            h.mock.clone(),
            UpdateSettings {
                retry: RetryPolicy::new(3, Duration::from_secs(2)),
                ..settings(0)
            },
        )
        .update_image(&tag())
        .await
        .unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }
}
