use async_trait::async_trait;

pub mod gemini;

pub use gemini::GeminiDetector;

use crate::highlights::{timestamp, Highlight};
use crate::Result;

/// Proposes highlight segments for a source video
#[async_trait]
pub trait HighlightDetector: Send + Sync {
    /// Detect highlights in detector order. An empty list is a valid answer.
    async fn detect(&self, source: &str, instruction: Option<&str>) -> Result<Vec<Highlight>>;
}

/// Canonicalize a detector-supplied bound, keeping text that does not parse.
///
/// Unparsable bounds are kept verbatim so the extractor reports them as an
/// invalid range instead of the highlight silently losing a bound.
pub fn canonical_bound(raw: Option<String>) -> Option<String> {
    raw.map(|text| {
        let trimmed = text.trim();
        match timestamp::normalize(trimmed) {
            Ok(canonical) => canonical,
            Err(e) => {
                tracing::debug!(bound = %trimmed, error = %e, "Keeping unparsable highlight bound");
                trimmed.to_string()
            }
        }
    })
    .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_bound() {
        assert_eq!(canonical_bound(Some("00:15".into())), Some("00:00:15".into()));
        assert_eq!(canonical_bound(Some(" 1:02:03 ".into())), Some("01:02:03".into()));
        assert_eq!(canonical_bound(Some("soon".into())), Some("soon".into()));
        assert_eq!(canonical_bound(Some("  ".into())), None);
        assert_eq!(
            canonical_bound(Some("9999999999999999:00:00".into())),
            Some("9999999999999999:00:00".into())
        );
        assert_eq!(canonical_bound(None), None);
    }
}
