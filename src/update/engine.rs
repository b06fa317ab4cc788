// ABOUTME: Engine facade used by the updater.
// ABOUTME: Wraps every engine call in the retry executor and tags failures with step and target.

use futures::StreamExt;
use snafu::ResultExt;

use crate::retry::{RetryPolicy, retry};
use crate::runtime::{
    ContainerError, ContainerFilters, ContainerRecord, ContainerSpec, FullRuntime, ImageError,
    ImageRecord, InspectedContainer, PruneReport,
};
use crate::types::{ContainerId, ImageId, ImageRef};

use super::error::{ContainerSnafu, EngineError, ImageSnafu, Step};
use super::snapshot::{ContainerSnapshot, build_snapshot};

/// Terminal state of a pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullStatus {
    /// Last milestone status, or the last event when the engine sent none.
    pub status: String,
    /// Number of progress events seen.
    pub events: usize,
}

impl PullStatus {
    /// True when the engine already had the newest image for the tag.
    pub fn is_up_to_date(&self) -> bool {
        self.status.contains("Image is up to date")
    }
}

fn log_critical<T>(result: Result<T, EngineError>) -> Result<T, EngineError> {
    result.inspect_err(|e| {
        if e.is_critical() {
            tracing::error!(step = %e.step(), subject = e.target(), error = %e, "critical engine failure");
        }
    })
}

/// Retrying, error-normalizing access to a runtime.
pub struct Engine<R> {
    runtime: R,
}

impl<R: FullRuntime> Engine<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub async fn list_images(
        &self,
        reference: &ImageRef,
        policy: RetryPolicy,
    ) -> Result<Vec<ImageRecord>, EngineError> {
        retry(policy, "list images", || self.runtime.list_images(reference))
            .await
            .context(ImageSnafu {
                step: Step::ListImages,
                target: reference.to_string(),
            })
    }

    /// Containers created from `ancestor`, stopped ones included when asked.
    pub async fn list_containers(
        &self,
        ancestor: &ImageId,
        include_stopped: bool,
        policy: RetryPolicy,
    ) -> Result<Vec<ContainerRecord>, EngineError> {
        let filters = ContainerFilters::ancestor(ancestor.as_str(), include_stopped);
        retry(policy, "list containers", || {
            self.runtime.list_containers(&filters)
        })
        .await
        .context(ContainerSnafu {
            step: Step::ListContainers,
            target: ancestor.to_string(),
        })
    }

    pub async fn inspect_container(
        &self,
        id: &ContainerId,
        policy: RetryPolicy,
    ) -> Result<InspectedContainer, EngineError> {
        retry(policy, "inspect container", || {
            self.runtime.inspect_container(id)
        })
        .await
        .context(ContainerSnafu {
            step: Step::Inspect,
            target: id.to_string(),
        })
    }

    /// Inspect a container and bind its configuration to `target`.
    pub async fn snapshot(
        &self,
        id: &ContainerId,
        target: &ImageId,
        policy: RetryPolicy,
    ) -> Result<ContainerSnapshot, EngineError> {
        let inspected = self.inspect_container(id, policy).await?;
        Ok(build_snapshot(&inspected, target))
    }

    /// Pull `tag` to completion. Every attempt starts a fresh pull.
    pub async fn pull_image(
        &self,
        tag: &ImageRef,
        policy: RetryPolicy,
    ) -> Result<PullStatus, EngineError> {
        retry(policy, "pull image", || self.pull_once(tag))
            .await
            .context(ImageSnafu {
                step: Step::Pull,
                target: tag.to_string(),
            })
    }

    async fn pull_once(&self, tag: &ImageRef) -> Result<PullStatus, ImageError> {
        let mut stream = self.runtime.pull_image(tag);
        let mut pull = PullStatus::default();
        let mut milestone = None;

        while let Some(event) = stream.next().await {
            let event = event?;
            pull.events += 1;
            if event.is_milestone() {
                tracing::info!(image = %tag, status = %event.status, "pull");
                milestone = Some(event.status);
            } else {
                tracing::debug!(
                    image = %tag,
                    layer = event.id.as_deref().unwrap_or("-"),
                    progress = event.progress.as_deref().unwrap_or(""),
                    "pull: {}",
                    event.status
                );
                pull.status = event.status;
            }
        }

        if let Some(status) = milestone {
            pull.status = status;
        }
        Ok(pull)
    }

    pub async fn remove_image(&self, id: &ImageId, policy: RetryPolicy) -> Result<(), EngineError> {
        retry(policy, "remove image", || self.runtime.remove_image(id))
            .await
            .context(ImageSnafu {
                step: Step::RemoveImage,
                target: id.to_string(),
            })
    }

    pub async fn prune_images(&self, policy: RetryPolicy) -> Result<PruneReport, EngineError> {
        retry(policy, "prune images", || self.runtime.prune_images())
            .await
            .context(ImageSnafu {
                step: Step::Prune,
                target: "dangling images",
            })
    }

    /// Remove a container. A container that is already gone counts as
    /// removed, so a retry after a lost response does not fail.
    pub async fn remove_container(
        &self,
        id: &ContainerId,
        force: bool,
        policy: RetryPolicy,
    ) -> Result<(), EngineError> {
        log_critical(
            retry(policy, "remove container", || async {
                match self.runtime.remove_container(id, force).await {
                    Err(ContainerError::NotFound(_)) => {
                        tracing::debug!(id = id.short(), "container already removed");
                        Ok(())
                    }
                    other => other,
                }
            })
            .await
            .context(ContainerSnafu {
                step: Step::RemoveContainer,
                target: id.to_string(),
            }),
        )
    }

    pub async fn create_container(
        &self,
        spec: &ContainerSpec,
        policy: RetryPolicy,
    ) -> Result<ContainerId, EngineError> {
        log_critical(
            retry(policy, "create container", || {
                self.runtime.create_container(spec)
            })
            .await
            .context(ContainerSnafu {
                step: Step::Create,
                target: spec.name.as_str(),
            }),
        )
    }

    pub async fn start_container(
        &self,
        id: &ContainerId,
        policy: RetryPolicy,
    ) -> Result<(), EngineError> {
        log_critical(
            retry(policy, "start container", || self.runtime.start_container(id))
                .await
                .context(ContainerSnafu {
                    step: Step::Start,
                    target: id.to_string(),
                }),
        )
    }
}
