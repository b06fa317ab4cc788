// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: List, inspect, remove, create, and start containers.

use super::shared_types::{ContainerRecord, ContainerSpec, InspectedContainer};
use crate::types::ContainerId;
use async_trait::async_trait;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerRecord>, ContainerError>;

    /// Get the full live configuration of a container.
    async fn inspect_container(
        &self,
        id: &ContainerId,
    ) -> Result<InspectedContainer, ContainerError>;

    /// Remove a container. With `force`, a running container is killed first.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// Create a container from the given spec.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Only containers created from this image (id or reference).
    pub ancestor: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilters {
    /// Containers created from `image`, running or not when `all` is set.
    pub fn ancestor(image: impl Into<String>, all: bool) -> Self {
        Self {
            ancestor: Some(image.into()),
            all,
        }
    }
}

/// Errors from container operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
