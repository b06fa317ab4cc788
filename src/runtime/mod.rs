// ABOUTME: Container runtime access for Docker and Podman.
// ABOUTME: Capability traits, local socket detection, the bollard client, and a test double.

mod bollard;
mod detection;
mod error;
pub mod mock;
pub mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use detection::{DetectionError, detect_local};
pub use error::{ConnectionError, RuntimeError, RuntimeErrorKind};
pub use traits::{
    ContainerError, ContainerFilters, ContainerOps, ContainerRecord, ContainerSpec,
    ContainerState, FullRuntime, ImageError, ImageOps, ImageRecord, InspectedContainer,
    PruneReport, PullProgress, PullStream,
};
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};
