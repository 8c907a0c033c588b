use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

pub mod timestamp;

pub use timestamp::{FormatError, TimestampFormat};

/// Identifier of one highlight, stable for the lifetime of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightId(String);

impl HighlightId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HighlightId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for HighlightId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for HighlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A detected, time-bounded segment of interest within a source video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: HighlightId,

    /// Start of the segment, canonical `HH:MM:SS` when the detector gave a parsable value
    pub start_time: Option<String>,

    /// End of the segment
    pub end_time: Option<String>,

    /// Free-text description from the detector
    pub description: Option<String>,
}

impl Highlight {
    /// Create a highlight with a freshly generated identifier
    pub fn new(
        start_time: Option<String>,
        end_time: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: HighlightId::generate(),
            start_time,
            end_time,
            description,
        }
    }

    /// Both bounds, or `None` when either one is missing
    pub fn bounds(&self) -> Option<(&str, &str)> {
        match (&self.start_time, &self.end_time) {
            (Some(start), Some(end)) => Some((start.as_str(), end.as_str())),
            _ => None,
        }
    }
}

/// Why a highlight was never handed to the extraction tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SkipReason {
    #[error("missing bound")]
    MissingBound,
}

/// Why extraction of a highlight did not produce a clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum FailureReason {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("tool error: {0}")]
    ToolError(String),
}

/// Per-highlight result of the extraction stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipStatus {
    Extracted(PathBuf),
    Skipped(SkipReason),
    Failed(FailureReason),
}

/// Extraction result for exactly one submitted highlight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub highlight_id: HighlightId,

    /// Position of the highlight in the submitted list (diagnostics and file naming only)
    pub ordinal: usize,

    pub status: ClipStatus,
}

impl ExtractionOutcome {
    /// Local clip path when the highlight was extracted
    pub fn clip_path(&self) -> Option<&PathBuf> {
        match &self.status {
            ClipStatus::Extracted(path) => Some(path),
            _ => None,
        }
    }
}

/// Durable location of a published clip and the highlight it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReference {
    pub highlight_id: HighlightId,
    pub url: String,
}

/// Externally visible result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Clip URLs in detector order, highlights without a clip omitted
    pub clips: Vec<String>,

    /// Every highlight as detected
    pub highlights: Vec<Highlight>,

    /// Source identifier used as the metadata key
    pub source_id: String,
}
