use async_trait::async_trait;
use std::path::Path;

pub mod s3;

pub use s3::S3Publisher;

use crate::Result;

/// Uploads a local clip and returns its durable URL
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn publish(&self, local_path: &Path) -> Result<String>;
}
