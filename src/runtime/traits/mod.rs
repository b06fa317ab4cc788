// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ImageOps and ContainerOps; FullRuntime is implemented automatically.

mod container;
mod image;
mod shared_types;

pub use container::{ContainerError, ContainerFilters, ContainerOps};
pub use image::{ImageError, ImageOps, PullStream};
pub use shared_types::*;

/// Everything the updater needs from an engine.
pub trait FullRuntime: ImageOps + ContainerOps {}

impl<T: ImageOps + ContainerOps> FullRuntime for T {}
