// ABOUTME: Rolling-update orchestrator: preconditions, pull, concurrent replacement, commit.
// ABOUTME: Keeps the old image whenever any container was not replaced.

use futures::future::join_all;
use nonempty::NonEmpty;

use crate::diagnostics::{Diagnostics, Warning};
use crate::retry::RetryPolicy;
use crate::runtime::{ContainerRecord, FullRuntime, ImageRecord};
use crate::types::{ImageId, ImageRef};

use super::engine::Engine;
use super::error::{PreconditionError, UpdateError};
use super::report::{TaskReport, UpdatePlan, UpdatePlanPreview, UpdateReport};
use super::task::UpdateTask;

/// Knobs for one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    /// Policy for every engine call of the update itself.
    pub retry: RetryPolicy,
    /// Prune dangling images after a complete update, with this policy.
    pub prune: Option<RetryPolicy>,
    /// Replace stopped containers too (they are recreated but not started).
    pub include_stopped: bool,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            prune: None,
            include_stopped: true,
        }
    }
}

/// Result of an update that did not fail.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// Every container now runs from the new image.
    Updated(UpdateReport),
    /// The pull found nothing new; nothing was touched.
    AlreadyCurrent { tag: String, image: ImageId },
}

/// Replaces containers of an image with containers of its newer version.
pub struct Updater<R> {
    engine: Engine<R>,
    settings: UpdateSettings,
}

impl<R: FullRuntime> Updater<R> {
    pub fn new(runtime: R, settings: UpdateSettings) -> Self {
        Self {
            engine: Engine::new(runtime),
            settings,
        }
    }

    pub fn engine(&self) -> &Engine<R> {
        &self.engine
    }

    pub fn settings(&self) -> &UpdateSettings {
        &self.settings
    }

    /// Resolve what an update of `tag` would replace, without pulling.
    pub async fn plan(&self, tag: &ImageRef) -> Result<UpdatePlanPreview, UpdateError> {
        let (image, containers) = self.preconditions(tag).await?;
        Ok(UpdatePlanPreview {
            tag: tag.to_string(),
            old_image: image.id,
            containers,
        })
    }

    /// Pull `tag` and replace every container of the old image.
    ///
    /// # Errors
    ///
    /// - `Precondition` when the tag does not name exactly one local image
    ///   or no container uses it. Nothing was changed.
    /// - `Engine` when listing or pulling fails after retries. Nothing was
    ///   changed.
    /// - `NewImageUnresolved` when the pull reported new content that cannot
    ///   be found locally.
    /// - `Incomplete` when at least one container was not replaced. The old
    ///   image is kept so rolled-back containers keep working.
    pub async fn update_image(&self, tag: &ImageRef) -> Result<UpdateOutcome, UpdateError> {
        let (old, containers) = self.preconditions(tag).await?;
        tracing::info!(
            image = %tag,
            old = old.id.short(),
            containers = containers.len(),
            "updating image"
        );

        let pull = self.engine.pull_image(tag, self.settings.retry).await?;
        if pull.is_up_to_date() {
            tracing::info!(image = %tag, "image already up to date");
            return Ok(UpdateOutcome::AlreadyCurrent {
                tag: tag.to_string(),
                image: old.id,
            });
        }

        let new_image = self.resolve_new_image(tag, &old.id).await?;
        tracing::info!(image = %tag, new = new_image.short(), "pulled new image");

        let plan = UpdatePlan {
            tag: tag.to_string(),
            old_image: old.id,
            new_image,
            containers,
        };
        let tasks = self.replace_all(&plan).await;
        self.commit(&plan, tasks).await
    }

    async fn preconditions(
        &self,
        tag: &ImageRef,
    ) -> Result<(ImageRecord, NonEmpty<ContainerRecord>), UpdateError> {
        let mut images = self.engine.list_images(tag, self.settings.retry).await?;
        let image = match images.len() {
            0 => {
                return Err(PreconditionError::ImageNotFound {
                    tag: tag.to_string(),
                }
                .into());
            }
            1 => images.remove(0),
            found => {
                return Err(PreconditionError::AmbiguousImage {
                    tag: tag.to_string(),
                    found,
                }
                .into());
            }
        };

        let listed = self
            .engine
            .list_containers(&image.id, self.settings.include_stopped, self.settings.retry)
            .await?;
        let containers = direct_users(listed, &image.id);
        let containers =
            NonEmpty::from_vec(containers).ok_or_else(|| PreconditionError::NoContainers {
                tag: tag.to_string(),
                image: image.id.clone(),
            })?;

        Ok((image, containers))
    }

    /// Find the image the tag points at after the pull.
    ///
    /// The old image may still be listed (other tags, or engines that keep
    /// the old tag until it is untagged), so exactly one image other than
    /// the old one must match.
    async fn resolve_new_image(&self, tag: &ImageRef, old: &ImageId) -> Result<ImageId, UpdateError> {
        let images = self.engine.list_images(tag, self.settings.retry).await?;
        let found = images.len();
        let mut candidates = images.into_iter().filter(|i| &i.id != old);

        match (candidates.next(), candidates.next()) {
            (Some(image), None) if found <= 2 => Ok(image.id),
            _ => Err(UpdateError::NewImageUnresolved { found }),
        }
    }

    async fn replace_all(&self, plan: &UpdatePlan) -> Vec<TaskReport> {
        join_all(
            plan.containers
                .iter()
                .map(|record| self.replace_one(record.clone(), plan)),
        )
        .await
    }

    async fn replace_one(&self, record: ContainerRecord, plan: &UpdatePlan) -> TaskReport {
        let policy = self.settings.retry;
        let task = UpdateTask::new(record);

        let task = match task.snapshot(&self.engine, &plan.new_image, policy).await {
            Ok(task) => task,
            Err((task, e)) => return task.intact(&e),
        };
        let task = match task.remove(&self.engine, policy).await {
            Ok(task) => task,
            Err((task, e)) => return task.intact(&e),
        };
        match task.recreate(&self.engine, policy).await {
            Ok(task) => task.finish(),
            Err((task, e)) => task.rollback(&self.engine, &plan.old_image, policy, &e).await,
        }
    }

    async fn commit(
        &self,
        plan: &UpdatePlan,
        tasks: Vec<TaskReport>,
    ) -> Result<UpdateOutcome, UpdateError> {
        let mut report = UpdateReport::new(plan, tasks);

        if !report.is_complete() {
            tracing::error!(
                image = %plan.tag,
                failed = report.failed(),
                total = report.total(),
                rolled_back = report.rolled_back(),
                rollback_failed = report.rollback_failed(),
                "update incomplete, keeping old image"
            );
            return Err(UpdateError::Incomplete(Box::new(report)));
        }

        let mut diagnostics = Diagnostics::default();
        match self
            .engine
            .remove_image(&plan.old_image, self.settings.retry)
            .await
        {
            Ok(()) => {
                tracing::info!(image = plan.old_image.short(), "removed old image");
                report.old_image_removed = true;
            }
            Err(e) => diagnostics.warn(Warning::image_removal(format!(
                "old image {} was not removed: {e}",
                plan.old_image.short()
            ))),
        }

        if let Some(policy) = self.settings.prune {
            match self.engine.prune_images(policy).await {
                Ok(pruned) => {
                    tracing::debug!(
                        deleted = pruned.deleted.len(),
                        untagged = pruned.untagged.len(),
                        space_reclaimed = pruned.space_reclaimed,
                        "pruned dangling images"
                    );
                    report.pruned = Some(pruned);
                }
                Err(e) => diagnostics.warn(Warning::prune(format!(
                    "dangling images were not pruned: {e}"
                ))),
            }
        }

        report.warnings = diagnostics.into_warnings();
        tracing::info!(
            image = %plan.tag,
            replaced = report.replaced(),
            "update complete"
        );
        Ok(UpdateOutcome::Updated(report))
    }
}

/// Keep the containers created from `image` itself.
///
/// The engine's ancestor filter also matches containers of images built on
/// top of `image`. Those keep their own image and are skipped.
fn direct_users(listed: Vec<ContainerRecord>, image: &ImageId) -> Vec<ContainerRecord> {
    listed
        .into_iter()
        .filter(|record| {
            let direct = record.image_id == image.as_str();
            if !direct {
                tracing::info!(
                    container = record.display_name(),
                    image = record.image_id.as_str(),
                    "skipping container of a derived image"
                );
            }
            direct
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mock::{MockRuntime, PullBehavior, sample_container};
    use std::time::Duration;

    fn settings() -> UpdateSettings {
        UpdateSettings {
            retry: RetryPolicy::new(1, Duration::ZERO),
            prune: None,
            include_stopped: true,
        }
    }

    fn tag() -> ImageRef {
        ImageRef::parse("app:latest").unwrap()
    }

    #[tokio::test]
    async fn new_image_is_resolved_when_old_is_untagged() {
        let mock = MockRuntime::new();
        let old = mock.add_image("sha256:old", &["app:latest"]);
        mock.add_container(sample_container("c1", "web", &old, true));
        mock.set_pull(PullBehavior::NewImage(ImageId::new("sha256:new")));

        let outcome = Updater::new(mock.clone(), settings())
            .update_image(&tag())
            .await
            .unwrap();

        let UpdateOutcome::Updated(report) = outcome else {
            panic!("expected an update");
        };
        assert_eq!(report.new_image, ImageId::new("sha256:new"));
        assert!(report.old_image_removed);
        assert!(!mock.has_image(&old));
    }

    #[tokio::test]
    async fn new_image_must_be_unique() {
        let mock = MockRuntime::new();
        let old = mock.add_image("sha256:old", &["app:latest"]);
        let updater = Updater::new(mock.clone(), settings());

        let err = updater.resolve_new_image(&tag(), &old).await.unwrap_err();
        assert!(matches!(err, UpdateError::NewImageUnresolved { found: 1 }));

        mock.add_image("sha256:a", &["app:latest"]);
        mock.add_image("sha256:b", &["app:latest"]);
        let err = updater.resolve_new_image(&tag(), &old).await.unwrap_err();
        assert!(matches!(err, UpdateError::NewImageUnresolved { found: 3 }));
    }

    #[tokio::test]
    async fn old_image_may_still_be_listed() {
        let mock = MockRuntime::new();
        let old = mock.add_image("sha256:old", &["app:latest"]);
        mock.add_image("sha256:new", &["app:latest"]);

        let new = Updater::new(mock, settings())
            .resolve_new_image(&tag(), &old)
            .await
            .unwrap();
        assert_eq!(new, ImageId::new("sha256:new"));
    }

    #[tokio::test]
    async fn plan_lists_containers_without_mutating() {
        let mock = MockRuntime::new();
        let old = mock.add_image("sha256:old", &["app:latest"]);
        mock.add_container(sample_container("c1", "web", &old, true));
        mock.add_container(sample_container("c2", "worker", &old, false));

        let plan = Updater::new(mock.clone(), settings())
            .plan(&tag())
            .await
            .unwrap();

        assert_eq!(plan.old_image, old);
        assert_eq!(plan.containers.len(), 2);
        assert!(mock.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn derived_image_containers_are_not_planned() {
        let mock = MockRuntime::new();
        let old = mock.add_image("sha256:old", &["app:latest"]);
        let derived = mock.add_derived_image("sha256:derived", &["local/app:dev"], &old);
        mock.add_container(sample_container("c1", "web", &old, true));
        mock.add_container(sample_container("c2", "dev", &derived, true));

        let plan = Updater::new(mock, settings()).plan(&tag()).await.unwrap();

        assert_eq!(plan.containers.len(), 1);
        assert_eq!(plan.containers.first().display_name(), "web");
    }

    #[tokio::test]
    async fn running_only_skips_stopped_containers() {
        let mock = MockRuntime::new();
        let old = mock.add_image("sha256:old", &["app:latest"]);
        mock.add_container(sample_container("c1", "web", &old, true));
        mock.add_container(sample_container("c2", "worker", &old, false));

        let updater = Updater::new(
            mock.clone(),
            UpdateSettings {
                include_stopped: false,
                ..settings()
            },
        );
        let plan = updater.plan(&tag()).await.unwrap();

        assert_eq!(plan.containers.len(), 1);
        assert_eq!(plan.containers.first().display_name(), "web");
    }
}
