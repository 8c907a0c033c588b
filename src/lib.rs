//! Highlight Clipper - turns long-form videos into published highlight clips
//!
//! A run asks a video-understanding model for highlight segments, cuts each
//! segment out of the source with ffmpeg in a bounded worker pool, uploads the
//! clips to S3-compatible storage and records which highlight produced which clip.

pub mod cli;
pub mod clipper;
pub mod config;
pub mod detect;
pub mod highlights;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod publish;
pub mod sources;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use clipper::{ClipExtractor, ClipTool};
pub use config::Config;
pub use detect::HighlightDetector;
pub use highlights::{
    ArtifactReference, ClipStatus, ExtractionOutcome, FailureReason, Highlight, HighlightId,
    PipelineResult, SkipReason,
};
pub use metadata::MetadataRecorder;
pub use pipeline::{Collaborators, PipelineOrchestrator, RunRegistry, RunStatus};
pub use publish::ArtifactPublisher;
pub use sources::SourceResolver;

/// Result type used for collaborator plumbing throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Run-level errors. Any of these aborts the whole pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum ClipperError {
    #[error("No highlights found for source: {0}")]
    NoHighlightsFound(String),

    #[error("Highlight detection failed: {0}")]
    DetectionFailed(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Publishing {path} failed: {reason}")]
    PublishFailed { path: String, reason: String },

    #[error("Recording metadata failed: {0}")]
    RecordFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}
