// ABOUTME: Per-container outcomes and the aggregate update report.
// ABOUTME: Counts replaced, rolled back, rollback-failed, and untouched containers.

use nonempty::NonEmpty;
use serde::Serialize;

use crate::diagnostics::Warning;
use crate::runtime::{ContainerRecord, PruneReport};
use crate::types::{ContainerId, ImageId};

/// How one container ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Now running from the new image.
    Replaced,
    /// Failed before the old container was removed; left as it was.
    Intact,
    /// Replacement failed; recreated from the old image.
    RolledBack,
    /// Replacement and rollback both failed; the container is gone.
    RollbackFailed,
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskOutcome::Replaced => "replaced",
            TaskOutcome::Intact => "intact",
            TaskOutcome::RolledBack => "rolled back",
            TaskOutcome::RollbackFailed => "rollback failed",
        };
        f.write_str(s)
    }
}

/// Terminal record of one container's update task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub container: String,
    /// The container that was running before the update.
    pub source: ContainerId,
    /// The container created by this task (new or rolled back), if any.
    pub replacement: Option<ContainerId>,
    pub outcome: TaskOutcome,
    /// Why the replacement failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the rollback failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_error: Option<String>,
}

impl TaskReport {
    pub fn is_replaced(&self) -> bool {
        self.outcome == TaskOutcome::Replaced
    }
}

/// What an update would touch, resolved before the pull.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePlanPreview {
    pub tag: String,
    pub old_image: ImageId,
    pub containers: NonEmpty<ContainerRecord>,
}

/// What an update touches, once the new image is known.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub tag: String,
    pub old_image: ImageId,
    pub new_image: ImageId,
    pub containers: NonEmpty<ContainerRecord>,
}

/// Aggregate result of a rolling update.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub tag: String,
    pub old_image: ImageId,
    pub new_image: ImageId,
    pub tasks: Vec<TaskReport>,
    pub old_image_removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pruned: Option<PruneReport>,
    pub warnings: Vec<Warning>,
}

impl UpdateReport {
    pub(crate) fn new(plan: &UpdatePlan, tasks: Vec<TaskReport>) -> Self {
        Self {
            tag: plan.tag.clone(),
            old_image: plan.old_image.clone(),
            new_image: plan.new_image.clone(),
            tasks,
            old_image_removed: false,
            pruned: None,
            warnings: Vec::new(),
        }
    }

    fn count(&self, outcome: TaskOutcome) -> usize {
        self.tasks.iter().filter(|t| t.outcome == outcome).count()
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn replaced(&self) -> usize {
        self.count(TaskOutcome::Replaced)
    }

    pub fn rolled_back(&self) -> usize {
        self.count(TaskOutcome::RolledBack)
    }

    pub fn rollback_failed(&self) -> usize {
        self.count(TaskOutcome::RollbackFailed)
    }

    pub fn intact(&self) -> usize {
        self.count(TaskOutcome::Intact)
    }

    /// Containers not running from the new image.
    pub fn failed(&self) -> usize {
        self.total() - self.replaced()
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }
}
