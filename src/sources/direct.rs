use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::SourceFetcher;
use crate::utils::sanitize_filename;
use crate::Result;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv", "webm", "avi"];

/// Fetcher for direct links to video files
pub struct DirectFetcher {
    client: Client,
}

impl DirectFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Local file name for a URL, keeping its extension
    fn file_name_for(url: &Url) -> String {
        let last = url
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
            .unwrap_or("download.mp4");

        let decoded = urlencoding::decode(last)
            .map(|name| name.into_owned())
            .unwrap_or_else(|_| last.to_string());

        let sanitized = sanitize_filename(&decoded);
        if sanitized.is_empty() {
            "download.mp4".to_string()
        } else {
            sanitized
        }
    }

    fn video_extension(url: &Url) -> Option<String> {
        let name = url.path_segments()?.last()?;
        let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
        VIDEO_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }
}

#[async_trait]
impl SourceFetcher for DirectFetcher {
    fn supports(&self, reference: &str) -> bool {
        match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                Self::video_extension(&url).is_some()
            }
            _ => false,
        }
    }

    fn platform_name(&self) -> &'static str {
        "Direct URL"
    }

    async fn fetch(&self, reference: &str, dir: &Path) -> Result<PathBuf> {
        let url = Url::parse(reference)
            .map_err(|_| anyhow::anyhow!("Invalid URL: {}", reference))?;
        let path = dir.join(Self::file_name_for(&url));

        tracing::debug!("Downloading {} to {}", reference, path.display());

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to download video: HTTP {}", response.status());
        }

        let mut file = tokio::fs::File::create(&path).await?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(bytes = downloaded, "Download complete");
        Ok(path)
    }
}

impl Default for DirectFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_video_links_only() {
        let fetcher = DirectFetcher::new();
        assert!(fetcher.supports("https://cdn.example.com/media/talk.mp4"));
        assert!(fetcher.supports("http://example.com/a/b/clip.WEBM?sig=1"));
        assert!(!fetcher.supports("https://example.com/page.html"));
        assert!(!fetcher.supports("ftp://example.com/talk.mp4"));
        assert!(!fetcher.supports("/local/talk.mp4"));
    }

    #[test]
    fn test_file_name_is_decoded_and_sanitized() {
        let url = Url::parse("https://cdn.example.com/My%20Talk%3F.mp4").unwrap();
        assert_eq!(DirectFetcher::file_name_for(&url), "My_Talk_.mp4");

        let bare = Url::parse("https://cdn.example.com/").unwrap();
        assert_eq!(DirectFetcher::file_name_for(&bare), "download.mp4");
    }
}
