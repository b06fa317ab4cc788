// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: List by reference, pull with streamed progress, remove, prune.

use super::shared_types::{ImageRecord, PruneReport, PullProgress};
use crate::types::{ImageId, ImageRef};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Lazy sequence of pull progress events. Ends after the terminal status.
pub type PullStream = Pin<Box<dyn Stream<Item = Result<PullProgress, ImageError>> + Send>>;

/// Image operations.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// List images whose tags match the reference.
    async fn list_images(&self, reference: &ImageRef) -> Result<Vec<ImageRecord>, ImageError>;

    /// Start pulling an image. Nothing happens until the stream is polled.
    fn pull_image(&self, reference: &ImageRef) -> PullStream;

    /// Remove an image by id. Does not force removal of images in use.
    async fn remove_image(&self, id: &ImageId) -> Result<(), ImageError>;

    /// Remove dangling (untagged, unused) images.
    async fn prune_images(&self) -> Result<PruneReport, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
