// ABOUTME: Update task state markers for the type state pattern.
// ABOUTME: Each state carries the data that exists at that point of the pipeline.

use crate::types::ContainerId;

use super::snapshot::ContainerSnapshot;

/// Initial state: container discovered, nothing read or changed yet.
/// Available actions: `snapshot()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending;

/// Configuration captured and bound to the new image.
/// Available actions: `remove()`
#[derive(Debug, Clone)]
pub struct Snapshotted {
    pub(crate) snapshot: ContainerSnapshot,
}

/// Old container removed.
/// Available actions: `recreate()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Removed {
    pub(crate) snapshot: ContainerSnapshot,
    /// Replacement that was created but failed to start.
    pub(crate) leftover: Option<ContainerId>,
}

/// Replacement created from the new image (and started if the old one ran).
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Replaced {
    pub(crate) snapshot: ContainerSnapshot,
    pub(crate) container: ContainerId,
}
