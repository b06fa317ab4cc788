// ABOUTME: Per-container update task parameterized by state marker.
// ABOUTME: State types carry their own data so a removed container always has a snapshot.

use crate::runtime::ContainerRecord;
use crate::types::ContainerId;

use super::snapshot::ContainerSnapshot;
use super::state::{Pending, Removed, Replaced, Snapshotted};

/// Replacement of one container, parameterized by its current state.
#[derive(Debug)]
pub struct UpdateTask<S> {
    pub(crate) record: ContainerRecord,
    pub(crate) state: S,
}

impl UpdateTask<Pending> {
    pub fn new(record: ContainerRecord) -> Self {
        UpdateTask {
            record,
            state: Pending,
        }
    }
}

impl<S> UpdateTask<S> {
    /// The container as it was listed before the update.
    pub fn record(&self) -> &ContainerRecord {
        &self.record
    }

    pub fn source(&self) -> &ContainerId {
        &self.record.id
    }

    pub fn name(&self) -> &str {
        self.record.display_name()
    }
}

impl UpdateTask<Snapshotted> {
    pub fn snapshot(&self) -> &ContainerSnapshot {
        &self.state.snapshot
    }
}

impl UpdateTask<Removed> {
    pub fn snapshot(&self) -> &ContainerSnapshot {
        &self.state.snapshot
    }

    /// A replacement left behind by a failed start.
    pub fn leftover(&self) -> Option<&ContainerId> {
        self.state.leftover.as_ref()
    }
}

impl UpdateTask<Replaced> {
    pub fn snapshot(&self) -> &ContainerSnapshot {
        &self.state.snapshot
    }

    /// Get the new container ID.
    pub fn replacement(&self) -> &ContainerId {
        &self.state.container
    }
}
