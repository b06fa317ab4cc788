// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: Image and container records, inspected state, creation specs, pull progress.

use crate::types::{ContainerId, ImageId};
use bollard::models::{ContainerConfig, EndpointSettings, HostConfig};
use serde::Serialize;
use std::collections::HashMap;

/// An image known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    /// Content-addressed id (`sha256:…`).
    pub id: ImageId,
    /// Repository tags currently pointing at this image.
    pub tags: Vec<String>,
}

/// Coarse container state, as far as the updater cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running,
    Stopped,
    Other,
}

impl ContainerState {
    /// Map an engine state string (`running`, `exited`, …).
    pub fn from_engine(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "running" => ContainerState::Running,
            "created" | "exited" | "stopped" => ContainerState::Stopped,
            _ => ContainerState::Other,
        }
    }

    pub fn is_running(self) -> bool {
        self == ContainerState::Running
    }
}

/// A container as returned by a list query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerRecord {
    pub id: ContainerId,
    /// Names with the engine's leading `/` removed.
    pub names: Vec<String>,
    pub state: ContainerState,
    /// Id of the image the container was created from.
    pub image_id: String,
}

impl ContainerRecord {
    /// Primary name, falling back to the short id for unnamed containers.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map_or_else(|| self.id.short(), String::as_str)
    }
}

/// Full live configuration of a container, as reported by inspect.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectedContainer {
    pub id: ContainerId,
    /// Name without the leading `/`.
    pub name: String,
    pub running: bool,
    /// Image id the container runs.
    pub image: String,
    pub config: Option<ContainerConfig>,
    pub host_config: Option<HostConfig>,
    /// Endpoint settings keyed by network name.
    pub networks: HashMap<String, EndpointSettings>,
    /// MAC address of the primary network endpoint.
    pub mac_address: Option<String>,
}

/// Everything needed to create a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    /// Image id or reference to create from.
    pub image: String,
    pub config: ContainerConfig,
    pub host_config: Option<HostConfig>,
    /// Endpoint settings keyed by network name, applied at creation.
    pub endpoints: HashMap<String, EndpointSettings>,
    pub mac_address: Option<String>,
}

/// One event from an image pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullProgress {
    /// Layer id, when the event is about a layer.
    pub id: Option<String>,
    pub status: String,
    /// Human-readable progress bar, if any.
    pub progress: Option<String>,
}

impl PullProgress {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Default::default()
        }
    }

    /// Milestone events summarize the pull (`Status: Downloaded newer image …`);
    /// everything else is per-layer chatter.
    pub fn is_milestone(&self) -> bool {
        self.status.starts_with("Status:")
    }
}

/// Result of pruning dangling images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub deleted: Vec<String>,
    pub untagged: Vec<String>,
    pub space_reclaimed: u64,
}
