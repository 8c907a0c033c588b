use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

pub mod runs;

pub use runs::{RunId, RunRegistry, RunStatus};

use crate::clipper::{ClipExtractor, FfmpegTool};
use crate::config::{Config, MetadataBackend};
use crate::detect::{GeminiDetector, HighlightDetector};
use crate::highlights::{
    ArtifactReference, ClipStatus, ExtractionOutcome, HighlightId, PipelineResult,
};
use crate::metadata::{FirestoreRecorder, JsonFileRecorder, MetadataRecorder};
use crate::publish::{ArtifactPublisher, S3Publisher};
use crate::sources::{SourceRegistry, SourceResolver};
use crate::ClipperError;

/// External collaborators a pipeline run depends on
#[derive(Clone)]
pub struct Collaborators {
    pub detector: Arc<dyn HighlightDetector>,
    pub resolver: Arc<dyn SourceResolver>,
    pub publisher: Arc<dyn ArtifactPublisher>,
    pub recorder: Arc<dyn MetadataRecorder>,
}

/// Run settings that are not collaborators
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Each run gets its own subdirectory here for extracted clips
    pub work_dir: PathBuf,

    /// Keep extracted clips after the run instead of deleting its directory
    pub keep_clips: bool,
}

/// Stages of a single run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Started,
    HighlightsDetected,
    SourceResolved,
    Extracted,
    Published,
    Recorded,
    Completed,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Started => "started",
            RunStage::HighlightsDetected => "highlights_detected",
            RunStage::SourceResolved => "source_resolved",
            RunStage::Extracted => "extracted",
            RunStage::Published => "published",
            RunStage::Recorded => "recorded",
            RunStage::Completed => "completed",
            RunStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Sequences detection, resolution, extraction, publishing and recording
pub struct PipelineOrchestrator {
    collaborators: Collaborators,
    extractor: ClipExtractor,
    options: PipelineOptions,
}

impl PipelineOrchestrator {
    pub fn new(collaborators: Collaborators, extractor: ClipExtractor, options: PipelineOptions) -> Self {
        Self {
            collaborators,
            extractor,
            options,
        }
    }

    /// Wire the production collaborators from configuration
    pub async fn from_config(config: &Config) -> Result<Self, ClipperError> {
        config
            .validate()
            .map_err(|e| ClipperError::Config(format!("{:#}", e)))?;

        let config_error = |e: anyhow::Error| ClipperError::Config(format!("{:#}", e));

        let recorder: Arc<dyn MetadataRecorder> = match config.metadata.backend {
            MetadataBackend::Local => Arc::new(JsonFileRecorder::new(config.metadata_dir())),
            MetadataBackend::Firestore => {
                Arc::new(FirestoreRecorder::new(&config.metadata).map_err(config_error)?)
            }
        };

        let collaborators = Collaborators {
            detector: Arc::new(GeminiDetector::new(&config.detector).map_err(config_error)?),
            resolver: Arc::new(SourceRegistry::from_config(config)),
            publisher: Arc::new(S3Publisher::new(config).await.map_err(config_error)?),
            recorder,
        };

        let extractor = ClipExtractor::new(
            Arc::new(FfmpegTool::new(config.extraction.ffmpeg_path.clone())),
            config.extraction_concurrency(),
            config.extraction.trailing_pad_secs,
        );

        Ok(Self::new(
            collaborators,
            extractor,
            PipelineOptions {
                work_dir: config.work_dir(),
                keep_clips: config.app.keep_clips,
            },
        ))
    }

    /// Run the whole pipeline for one source.
    ///
    /// Any run-level failure aborts immediately; there is no resume, a failed
    /// run has to be started again from the beginning.
    pub async fn run(
        &self,
        source: &str,
        instruction: Option<&str>,
    ) -> Result<PipelineResult, ClipperError> {
        let run_dir = self.options.work_dir.join(Uuid::new_v4().to_string());
        let result = self.run_in(source, instruction, &run_dir).await;

        if let Err(e) = &result {
            tracing::error!(stage = %RunStage::Failed, error = %e, source = %source, "Pipeline run failed");
        }

        if !self.options.keep_clips {
            cleanup(&run_dir).await;
        }

        result
    }

    async fn run_in(
        &self,
        source: &str,
        instruction: Option<&str>,
        run_dir: &Path,
    ) -> Result<PipelineResult, ClipperError> {
        stage(RunStage::Started, source);

        let highlights = self
            .collaborators
            .detector
            .detect(source, instruction)
            .await
            .map_err(|e| ClipperError::DetectionFailed(format!("{:#}", e)))?;

        if highlights.is_empty() {
            return Err(ClipperError::NoHighlightsFound(source.to_string()));
        }
        tracing::info!(count = highlights.len(), "Detected highlights");
        stage(RunStage::HighlightsDetected, source);

        let local_path = self.resolve_source(source, &run_dir.join("source")).await?;
        stage(RunStage::SourceResolved, source);

        tokio::fs::create_dir_all(run_dir).await?;
        let outcomes = self.extractor.extract(&local_path, &highlights, run_dir).await;
        log_outcome_summary(&outcomes);
        stage(RunStage::Extracted, source);

        let artifacts = self.publish_clips(&outcomes).await?;
        stage(RunStage::Published, source);

        // Keyed join: only highlight ids that produced an artifact appear in the mapping
        let mapping: BTreeMap<HighlightId, String> = artifacts
            .iter()
            .map(|artifact| (artifact.highlight_id.clone(), artifact.url.clone()))
            .collect();

        self.collaborators
            .recorder
            .record_highlights(source, &highlights)
            .await
            .map_err(|e| ClipperError::RecordFailed(format!("{:#}", e)))?;
        self.collaborators
            .recorder
            .record_artifact_map(source, &mapping)
            .await
            .map_err(|e| ClipperError::RecordFailed(format!("{:#}", e)))?;
        stage(RunStage::Recorded, source);

        // Detector order decides the result order; highlights without an artifact leave no gap
        let clips = highlights
            .iter()
            .filter_map(|highlight| mapping.get(&highlight.id).cloned())
            .collect();

        stage(RunStage::Completed, source);
        Ok(PipelineResult {
            clips,
            highlights,
            source_id: source.to_string(),
        })
    }

    async fn resolve_source(&self, source: &str, download_dir: &Path) -> Result<PathBuf, ClipperError> {
        let resolver = &self.collaborators.resolver;
        if !resolver.requires_fetch(source) {
            tracing::debug!("Using local source {}", source);
            return Ok(PathBuf::from(source));
        }

        resolver
            .resolve(source, download_dir)
            .await
            .map_err(|e| ClipperError::SourceUnavailable(format!("{:#}", e)))
    }

    /// Publish every extracted clip; the first failure aborts the run
    async fn publish_clips(
        &self,
        outcomes: &[ExtractionOutcome],
    ) -> Result<Vec<ArtifactReference>, ClipperError> {
        let mut artifacts = Vec::new();

        for outcome in outcomes {
            let Some(path) = outcome.clip_path() else {
                continue;
            };

            let url = self
                .collaborators
                .publisher
                .publish(path)
                .await
                .map_err(|e| ClipperError::PublishFailed {
                    path: path.display().to_string(),
                    reason: format!("{:#}", e),
                })?;

            tracing::info!(highlight_id = %outcome.highlight_id, url = %url, "Published clip");
            artifacts.push(ArtifactReference {
                highlight_id: outcome.highlight_id.clone(),
                url,
            });
        }

        Ok(artifacts)
    }
}

fn stage(stage: RunStage, source: &str) {
    tracing::info!(stage = %stage, source = %source, "Pipeline stage reached");
}

fn log_outcome_summary(outcomes: &[ExtractionOutcome]) {
    let (mut extracted, mut skipped, mut failed) = (0, 0, 0);
    for outcome in outcomes {
        match outcome.status {
            ClipStatus::Extracted(_) => extracted += 1,
            ClipStatus::Skipped(_) => skipped += 1,
            ClipStatus::Failed(_) => failed += 1,
        }
    }

    tracing::info!(extracted, skipped, failed, "Extraction finished");
}

async fn cleanup(run_dir: &Path) {
    match tokio::fs::remove_dir_all(run_dir).await {
        Ok(()) => tracing::debug!("Removed run directory {}", run_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(error = %e, "Failed to remove run directory {}", run_dir.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = [
            RunStage::Started,
            RunStage::HighlightsDetected,
            RunStage::SourceResolved,
            RunStage::Extracted,
            RunStage::Published,
            RunStage::Recorded,
            RunStage::Completed,
            RunStage::Failed,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        assert_eq!(
            names,
            [
                "started",
                "highlights_detected",
                "source_resolved",
                "extracted",
                "published",
                "recorded",
                "completed",
                "failed"
            ]
        );
    }

    #[tokio::test]
    async fn test_cleanup_ignores_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("never-created");
        cleanup(&run_dir).await;
        assert!(!run_dir.exists());
    }
}
