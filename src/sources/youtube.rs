use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::SourceFetcher;
use crate::Result;

/// Prefer mp4 up to 1080p, falling back to whatever single file exists
const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4][height<=1080]+bestaudio[ext=m4a]/bestaudio[ext=mp4]/\
bestvideo[height<=1080]+bestaudio[ext=m4a]/bestaudio/\
best[ext=mp4][height<=1080]/best[height<=1080]/best";

/// YouTube video fetcher using yt-dlp
pub struct YoutubeFetcher {
    yt_dlp_path: String,
    cookies_file: Option<PathBuf>,
}

impl YoutubeFetcher {
    pub fn new(yt_dlp_path: impl Into<String>, cookies_file: Option<PathBuf>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
            cookies_file,
        }
    }

    fn build_args(&self, url: &str, dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--output".into(),
            dir.join("%(id)s.%(ext)s").into_os_string(),
        ];
        args.extend(
            [
                "--format",
                FORMAT_SELECTOR,
                "--merge-output-format",
                "mp4",
                "--no-playlist",
                "--geo-bypass",
                "--no-warnings",
                "--no-progress",
                // Final path after merging, printed once the file is in place
                "--print",
                "after_move:filepath",
            ]
            .map(OsString::from),
        );

        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.as_os_str().to_owned());
        }

        args.push(url.into());
        args
    }
}

#[async_trait]
impl SourceFetcher for YoutubeFetcher {
    fn supports(&self, reference: &str) -> bool {
        let lower = reference.to_lowercase();
        lower.contains("youtube.com/") || lower.contains("youtu.be/")
    }

    fn platform_name(&self) -> &'static str {
        "YouTube"
    }

    async fn fetch(&self, reference: &str, dir: &Path) -> Result<PathBuf> {
        tracing::debug!("Downloading video with yt-dlp: {}", reference);

        let output = Command::new(&self.yt_dlp_path)
            .args(self.build_args(reference, dir))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .ok_or_else(|| anyhow::anyhow!("yt-dlp did not report the downloaded file"))?;

        Ok(PathBuf::from(path))
    }
}
