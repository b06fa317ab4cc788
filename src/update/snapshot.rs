// ABOUTME: Projects an inspected container into a creation spec bound to a target image.
// ABOUTME: Pure; keeps config, host config, network endpoints, MAC address, and name.

use crate::runtime::{ContainerSpec, InspectedContainer};
use crate::types::{ContainerId, ImageId};

/// Everything needed to recreate one container, bound to an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSnapshot {
    /// Container the snapshot was taken from.
    pub source: ContainerId,
    pub was_running: bool,
    pub spec: ContainerSpec,
}

impl ContainerSnapshot {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Image the snapshot creates containers from.
    pub fn image(&self) -> &str {
        &self.spec.image
    }

    /// Same container, different image.
    pub fn rebind(&self, image: &ImageId) -> Self {
        let mut snapshot = self.clone();
        snapshot.spec.image = image.to_string();
        snapshot.spec.config.image = Some(image.to_string());
        snapshot
    }
}

/// Build a snapshot of `inspected` that creates from `target`.
pub fn build_snapshot(inspected: &InspectedContainer, target: &ImageId) -> ContainerSnapshot {
    let mut config = inspected.config.clone().unwrap_or_default();
    config.image = Some(target.to_string());

    ContainerSnapshot {
        source: inspected.id.clone(),
        was_running: inspected.running,
        spec: ContainerSpec {
            name: inspected.name.trim_start_matches('/').to_string(),
            image: target.to_string(),
            config,
            host_config: inspected.host_config.clone(),
            endpoints: inspected.networks.clone(),
            mac_address: inspected.mac_address.clone(),
        },
    }
}
