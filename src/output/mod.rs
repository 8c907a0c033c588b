use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::highlights::PipelineResult;

/// Render a run result in the requested format
pub fn render(result: &PipelineResult, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(result)),
        OutputFormat::Json => format_as_json(result),
    }
}

/// Save run result to file
pub async fn save_to_file(result: &PipelineResult, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}

/// Print run result to console
pub fn print_to_console(result: &PipelineResult, format: &OutputFormat) -> Result<()> {
    println!("{}", render(result, format)?);
    Ok(())
}

pub fn format_as_json(result: &PipelineResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn format_as_text(result: &PipelineResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Source: {}", result.source_id);
    let _ = writeln!(
        out,
        "Highlights: {} detected, {} clips published",
        result.highlights.len(),
        result.clips.len()
    );

    for (index, highlight) in result.highlights.iter().enumerate() {
        let _ = writeln!(
            out,
            "  [{}] {} - {}  {}",
            index + 1,
            highlight.start_time.as_deref().unwrap_or("?"),
            highlight.end_time.as_deref().unwrap_or("?"),
            highlight.description.as_deref().unwrap_or("")
        );
    }

    if !result.clips.is_empty() {
        let _ = writeln!(out, "Clips:");
        for url in &result.clips {
            let _ = writeln!(out, "  {}", url);
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlights::{Highlight, HighlightId};

    fn result() -> PipelineResult {
        PipelineResult {
            clips: vec!["bucket/a.mp4".into()],
            highlights: vec![
                Highlight {
                    id: HighlightId::from("a"),
                    start_time: Some("00:00:10".into()),
                    end_time: Some("00:00:20".into()),
                    description: Some("Opening joke".into()),
                },
                Highlight {
                    id: HighlightId::from("b"),
                    start_time: None,
                    end_time: Some("00:01:00".into()),
                    description: None,
                },
            ],
            source_id: "talk.mp4".into(),
        }
    }

    #[test]
    fn test_text_lists_highlights_and_clips() {
        let text = format_as_text(&result());
        assert!(text.contains("2 detected, 1 clips published"));
        assert!(text.contains("[1] 00:00:10 - 00:00:20  Opening joke"));
        assert!(text.contains("[2] ? - 00:01:00"));
        assert!(text.ends_with("bucket/a.mp4"));
    }

    #[test]
    fn test_json_round_trips() {
        let json = format_as_json(&result()).unwrap();
        let parsed: PipelineResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result());
    }
}
