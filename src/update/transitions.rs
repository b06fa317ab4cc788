// ABOUTME: State transition methods for one container's update.
// ABOUTME: Each method consumes self and returns the next state, or the unchanged task and the error.

use crate::retry::RetryPolicy;
use crate::runtime::FullRuntime;
use crate::types::{ContainerId, ImageId};

use super::engine::Engine;
use super::error::EngineError;
use super::report::{TaskOutcome, TaskReport};
use super::snapshot::ContainerSnapshot;
use super::state::{Pending, Removed, Replaced, Snapshotted};
use super::task::UpdateTask;

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<UpdateTask<T>, (UpdateTask<S>, EngineError)>;

/// Create a container from `snapshot` and start it if the original was
/// running. On a failed start the created container's id comes back with
/// the error.
async fn create_and_start<R: FullRuntime>(
    engine: &Engine<R>,
    snapshot: &ContainerSnapshot,
    policy: RetryPolicy,
) -> Result<ContainerId, (Option<ContainerId>, EngineError)> {
    tracing::info!(container = snapshot.name(), image = snapshot.image(), "creating container");
    let id = engine
        .create_container(&snapshot.spec, policy)
        .await
        .map_err(|e| (None, e))?;

    if snapshot.was_running {
        tracing::info!(container = snapshot.name(), id = id.short(), "starting container");
        if let Err(e) = engine.start_container(&id, policy).await {
            return Err((Some(id), e));
        }
    }
    Ok(id)
}

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> UpdateTask<S> {
    /// Internal helper to transition to a new state.
    fn into_state<T>(self, state: T) -> UpdateTask<T> {
        UpdateTask {
            record: self.record,
            state,
        }
    }

    fn report(
        &self,
        outcome: TaskOutcome,
        replacement: Option<ContainerId>,
        error: Option<&EngineError>,
    ) -> TaskReport {
        TaskReport {
            container: self.name().to_string(),
            source: self.source().clone(),
            replacement,
            outcome,
            error: error.map(ToString::to_string),
            rollback_error: None,
        }
    }

    /// Close a task that failed before its container was removed.
    pub fn intact(self, error: &EngineError) -> TaskReport {
        tracing::error!(
            container = self.name(),
            step = %error.step(),
            error = %error,
            "container left untouched"
        );
        self.report(TaskOutcome::Intact, None, Some(error))
    }
}

// =============================================================================
// Pending -> Snapshotted
// =============================================================================

impl UpdateTask<Pending> {
    /// Capture the container's configuration, bound to `target`.
    pub async fn snapshot<R: FullRuntime>(
        self,
        engine: &Engine<R>,
        target: &ImageId,
        policy: RetryPolicy,
    ) -> TransitionResult<Snapshotted, Pending> {
        match engine.snapshot(self.source(), target, policy).await {
            Ok(snapshot) => {
                tracing::debug!(
                    container = snapshot.name(),
                    running = snapshot.was_running,
                    networks = snapshot.spec.endpoints.len(),
                    "snapshot taken"
                );
                Ok(self.into_state(Snapshotted { snapshot }))
            }
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Snapshotted -> Removed
// =============================================================================

impl UpdateTask<Snapshotted> {
    /// Force-remove the old container. Running containers are killed.
    pub async fn remove<R: FullRuntime>(
        self,
        engine: &Engine<R>,
        policy: RetryPolicy,
    ) -> TransitionResult<Removed, Snapshotted> {
        tracing::info!(
            container = self.snapshot().name(),
            id = self.source().short(),
            "removing container"
        );
        match engine.remove_container(self.source(), true, policy).await {
            Ok(()) => {
                let snapshot = self.state.snapshot.clone();
                Ok(self.into_state(Removed {
                    snapshot,
                    leftover: None,
                }))
            }
            Err(e) => Err((self, e)),
        }
    }
}

// =============================================================================
// Removed -> Replaced, or rollback
// =============================================================================

impl UpdateTask<Removed> {
    /// Create the replacement from the snapshot and start it if the old
    /// container was running.
    pub async fn recreate<R: FullRuntime>(
        mut self,
        engine: &Engine<R>,
        policy: RetryPolicy,
    ) -> TransitionResult<Replaced, Removed> {
        match create_and_start(engine, &self.state.snapshot, policy).await {
            Ok(container) => {
                let snapshot = self.state.snapshot.clone();
                Ok(self.into_state(Replaced {
                    snapshot,
                    container,
                }))
            }
            Err((leftover, e)) => {
                self.state.leftover = leftover;
                Err((self, e))
            }
        }
    }

    /// Recreate the container from `old_image` after a failed replacement.
    ///
    /// A replacement that was created but did not start is force-removed
    /// first so its name is free again.
    pub async fn rollback<R: FullRuntime>(
        self,
        engine: &Engine<R>,
        old_image: &ImageId,
        policy: RetryPolicy,
        cause: &EngineError,
    ) -> TaskReport {
        tracing::warn!(
            container = self.snapshot().name(),
            step = %cause.step(),
            error = %cause,
            "replacement failed, rolling back to old image"
        );

        if let Some(leftover) = self.leftover()
            && let Err(e) = engine.remove_container(leftover, true, policy).await
        {
            tracing::warn!(
                container = self.snapshot().name(),
                id = leftover.short(),
                error = %e,
                "could not remove failed replacement"
            );
        }

        let snapshot = self.snapshot().rebind(old_image);
        match create_and_start(engine, &snapshot, policy).await {
            Ok(id) => {
                tracing::warn!(
                    container = snapshot.name(),
                    id = id.short(),
                    "recovered: container running from old image"
                );
                self.report(TaskOutcome::RolledBack, Some(id), Some(cause))
            }
            Err((created, e)) => {
                tracing::error!(
                    container = snapshot.name(),
                    error = %e,
                    "rollback failed, container is missing"
                );
                let mut report = self.report(TaskOutcome::RollbackFailed, created, Some(cause));
                report.rollback_error = Some(e.to_string());
                report
            }
        }
    }
}

// =============================================================================
// Replaced -> done
// =============================================================================

impl UpdateTask<Replaced> {
    pub fn finish(self) -> TaskReport {
        tracing::info!(
            container = self.snapshot().name(),
            id = self.replacement().short(),
            "container replaced"
        );
        let replacement = Some(self.replacement().clone());
        self.report(TaskOutcome::Replaced, replacement, None)
    }
}
