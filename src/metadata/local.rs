use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{document_id, MetadataRecorder};
use crate::highlights::{Highlight, HighlightId};
use crate::Result;

/// Records metadata as JSON documents in a local directory
pub struct JsonFileRecorder {
    dir: PathBuf,
}

impl JsonFileRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn highlights_path(&self, source_id: &str) -> PathBuf {
        self.dir
            .join("video_highlights")
            .join(format!("{}.json", document_id(source_id)))
    }

    pub fn clip_urls_path(&self, source_id: &str) -> PathBuf {
        self.dir
            .join("video_clip_urls")
            .join(format!("{}.json", document_id(source_id)))
    }

    async fn write_document(path: &Path, document: &impl Serialize) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec_pretty(document).context("Failed to serialize document")?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Recorded {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl MetadataRecorder for JsonFileRecorder {
    async fn record_highlights(&self, source_id: &str, highlights: &[Highlight]) -> Result<()> {
        let document = json!({
            "source_id": source_id,
            "highlights": highlights,
            "recorded_at": chrono::Utc::now(),
        });
        Self::write_document(&self.highlights_path(source_id), &document).await
    }

    async fn record_artifact_map(
        &self,
        source_id: &str,
        mapping: &BTreeMap<HighlightId, String>,
    ) -> Result<()> {
        let document = json!({
            "source_id": source_id,
            "highlight_to_url": mapping,
            "recorded_at": chrono::Utc::now(),
        });
        Self::write_document(&self.clip_urls_path(source_id), &document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn test_writes_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = JsonFileRecorder::new(dir.path());
        let source = "https://youtu.be/abc";

        let highlight = Highlight {
            id: HighlightId::from("a"),
            start_time: Some("00:00:10".into()),
            end_time: Some("00:00:20".into()),
            description: None,
        };
        recorder.record_highlights(source, &[highlight]).await.unwrap();

        let mapping = BTreeMap::from([(HighlightId::from("a"), "u_a".to_string())]);
        recorder.record_artifact_map(source, &mapping).await.unwrap();

        let highlights: Value =
            serde_json::from_slice(&fs_err::read(recorder.highlights_path(source)).unwrap()).unwrap();
        assert_eq!(highlights["highlights"][0]["id"], "a");

        let urls: Value =
            serde_json::from_slice(&fs_err::read(recorder.clip_urls_path(source)).unwrap()).unwrap();
        assert_eq!(urls["highlight_to_url"]["a"], "u_a");
    }
}
