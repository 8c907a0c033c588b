use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{ClipTool, ClipWindow};
use crate::Result;

/// Stream-copy clip extraction with ffmpeg
pub struct FfmpegTool {
    ffmpeg_path: String,
}

impl FfmpegTool {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn build_args(source: &Path, window: ClipWindow, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y"]
            .into_iter()
            .map(OsString::from)
            .collect();

        // Seek on the input side; copy mode cuts at keyframes
        args.push("-ss".into());
        args.push(window.start_secs.to_string().into());
        args.push("-to".into());
        args.push(window.end_secs.to_string().into());
        args.push("-i".into());
        args.push(source.as_os_str().to_owned());
        args.extend(["-c", "copy", "-avoid_negative_ts", "make_zero"].map(OsString::from));
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl ClipTool for FfmpegTool {
    async fn cut(&self, source: &Path, window: ClipWindow, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output_result = Command::new(&self.ffmpeg_path)
            .args(Self::build_args(source, window, output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output_result.status.success() {
            let error = String::from_utf8_lossy(&output_result.stderr);
            anyhow::bail!("ffmpeg exited with {}: {}", output_result.status, error.trim());
        }

        Ok(())
    }
}
