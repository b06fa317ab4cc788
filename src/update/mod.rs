// ABOUTME: Rolling image updates using the type state pattern.
// ABOUTME: Exports the updater, the engine facade, snapshots, task states, and reports.

mod engine;
mod error;
mod orchestrator;
mod report;
mod snapshot;
mod state;
mod task;
mod transitions;

pub use engine::{Engine, PullStatus};
pub use error::{EngineError, PreconditionError, Step, UpdateError};
pub use orchestrator::{UpdateOutcome, UpdateSettings, Updater};
pub use report::{TaskOutcome, TaskReport, UpdatePlan, UpdatePlanPreview, UpdateReport};
pub use snapshot::{ContainerSnapshot, build_snapshot};
pub use state::{Pending, Removed, Replaced, Snapshotted};
pub use task::UpdateTask;
pub use transitions::TransitionResult;
