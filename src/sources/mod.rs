use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod direct;
pub mod youtube;

use crate::config::Config;
use crate::Result;

/// Turns a source reference into a local, seekable media path
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Whether the reference needs a fetch step; local references pass through unchanged
    fn requires_fetch(&self, reference: &str) -> bool;

    /// Fetch the reference into `dir`, which belongs to the calling run alone
    async fn resolve(&self, reference: &str, dir: &Path) -> Result<PathBuf>;
}

/// Downloads media from one kind of remote source
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Check if this fetcher supports the given reference
    fn supports(&self, reference: &str) -> bool;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;

    /// Download the media into `dir` and return the local file path
    async fn fetch(&self, reference: &str, dir: &Path) -> Result<PathBuf>;
}

/// Registry for managing multiple fetchers
pub struct SourceRegistry {
    fetchers: Vec<Box<dyn SourceFetcher>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            fetchers: Vec::new(),
        }
    }

    /// Create a registry with the default fetchers
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        registry.register(Box::new(youtube::YoutubeFetcher::new(
            config.app.yt_dlp_path.clone(),
            config.app.cookies_file.clone(),
        )));
        registry.register(Box::new(direct::DirectFetcher::new()));

        registry
    }

    /// Register a new fetcher
    pub fn register(&mut self, fetcher: Box<dyn SourceFetcher>) {
        self.fetchers.push(fetcher);
    }

    /// Find a fetcher that supports the given reference
    pub fn find_fetcher(&self, reference: &str) -> Option<&dyn SourceFetcher> {
        self.fetchers
            .iter()
            .find(|fetcher| fetcher.supports(reference))
            .map(|boxed| boxed.as_ref())
    }

    /// List all supported platforms
    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.fetchers
            .iter()
            .map(|fetcher| fetcher.platform_name())
            .collect()
    }
}

#[async_trait]
impl SourceResolver for SourceRegistry {
    fn requires_fetch(&self, reference: &str) -> bool {
        self.find_fetcher(reference).is_some()
    }

    async fn resolve(&self, reference: &str, dir: &Path) -> Result<PathBuf> {
        let fetcher = self
            .find_fetcher(reference)
            .ok_or_else(|| anyhow::anyhow!("No fetcher found for source: {}", reference))?;

        tokio::fs::create_dir_all(dir).await?;

        tracing::info!(platform = fetcher.platform_name(), "Fetching source {}", reference);
        let fetched = match fetcher.fetch(reference, dir).await {
            Ok(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => Ok(path),
            Ok(path) => Err(anyhow::anyhow!(
                "Fetched source is missing on disk: {}",
                path.display()
            )),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(path) => {
                tracing::info!("Source available at {}", path.display());
                Ok(path)
            }
            Err(e) => {
                // Drop partial downloads with the directory
                if let Err(cleanup) = tokio::fs::remove_dir_all(dir).await {
                    tracing::warn!(error = %cleanup, "Failed to remove {}", dir.display());
                }
                Err(e)
            }
        }
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
