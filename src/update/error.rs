// ABOUTME: Error types for rolling updates.
// ABOUTME: Engine failures tagged with the step and target, precondition failures, and update errors.

use snafu::Snafu;

use crate::runtime::{ContainerError, ImageError};
use crate::types::ImageId;

use super::report::UpdateReport;

/// The engine operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ListImages,
    ListContainers,
    Inspect,
    Pull,
    RemoveImage,
    RemoveContainer,
    Create,
    Start,
    Prune,
}

impl Step {
    /// Steps that act on live containers. A failure here may leave a
    /// container missing.
    pub fn touches_containers(self) -> bool {
        matches!(self, Step::RemoveContainer | Step::Create | Step::Start)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Step::ListImages => "list-images",
            Step::ListContainers => "list-containers",
            Step::Inspect => "inspect",
            Step::Pull => "pull",
            Step::RemoveImage => "remove-image",
            Step::RemoveContainer => "remove-container",
            Step::Create => "create",
            Step::Start => "start",
            Step::Prune => "prune",
        };
        f.write_str(s)
    }
}

/// An engine call that still failed after its retries.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EngineError {
    #[snafu(display("{step} failed for {target}: {source}"))]
    Image {
        step: Step,
        target: String,
        source: ImageError,
    },

    #[snafu(display("{step} failed for {target}: {source}"))]
    Container {
        step: Step,
        target: String,
        source: ContainerError,
    },
}

impl EngineError {
    pub fn step(&self) -> Step {
        match self {
            EngineError::Image { step, .. } | EngineError::Container { step, .. } => *step,
        }
    }

    /// Image or container the call was about.
    pub fn target(&self) -> &str {
        match self {
            EngineError::Image { target, .. } | EngineError::Container { target, .. } => target,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.step().touches_containers()
    }
}

/// Reasons an update does not start. Nothing has been changed when one of
/// these is returned.
#[derive(Debug, thiserror::Error)]
pub enum PreconditionError {
    #[error("no image found for {tag}")]
    ImageNotFound { tag: String },

    #[error("expected exactly one image for {tag}, found {found}")]
    AmbiguousImage { tag: String, found: usize },

    #[error("no container uses image {tag} ({image})")]
    NoContainers { tag: String, image: ImageId },
}

/// Errors from a rolling update.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The pull reported new content but the new image cannot be told apart.
    #[error("cannot resolve the pulled image: {found} image(s) match the tag")]
    NewImageUnresolved { found: usize },

    /// Some containers were not replaced. The old image was kept.
    #[error(
        "update incomplete: {} of {} container(s) not replaced ({} rolled back, {} rollback failed, {} untouched); old image kept",
        .0.failed(), .0.total(), .0.rolled_back(), .0.rollback_failed(), .0.intact()
    )]
    Incomplete(Box<UpdateReport>),
}

impl UpdateError {
    /// Report of the partial update, if containers were touched.
    pub fn report(&self) -> Option<&UpdateReport> {
        match self {
            UpdateError::Incomplete(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snafu::ResultExt;

    #[test]
    fn only_container_steps_are_critical() {
        let err = Err::<(), _>(ContainerError::Runtime("boom".to_string()))
            .context(ContainerSnafu {
                step: Step::Create,
                target: "web",
            })
            .unwrap_err();
        assert!(err.is_critical());
        assert_eq!(err.target(), "web");
        assert_eq!(err.to_string(), "create failed for web: runtime error: boom");

        let err = Err::<(), _>(ImageError::PullFailed("timeout".to_string()))
            .context(ImageSnafu {
                step: Step::Pull,
                target: "nginx:latest",
            })
            .unwrap_err();
        assert!(!err.is_critical());
        assert_eq!(err.step(), Step::Pull);
    }

    #[test]
    fn step_names_are_kebab_case() {
        assert_eq!(Step::ListContainers.to_string(), "list-containers");
        assert_eq!(Step::RemoveImage.to_string(), "remove-image");
    }
}
