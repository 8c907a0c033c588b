//! Gemini-backed highlight detection.
//!
//! The source URL is handed to the model as file data together with an
//! editor-style prompt; the model answers with JSON constrained by a
//! response schema.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::{canonical_bound, HighlightDetector};
use crate::config::DetectorConfig;
use crate::highlights::Highlight;
use crate::Result;

const SYSTEM_PROMPT: &str = "\
You are a video editor for a YouTube channel who wants to turn a long video into short, engaging clips.
Meet the following constraints:
- Each highlight must be a direct part of the video and must not be out of context.
- Each highlight must be interesting and clippable, providing value to the viewer.
- A highlight shorter than 15 seconds is too short; one longer than 180 seconds is too long.
- A highlight must not cut off in the middle of a sentence or idea; ideas must be complete.
- A highlight should open with a catchy phrase and end with a conclusion or a cliffhanger.
- Timestamps use HH:MM:SS.
- Descriptions must be in the same language as the video.
Answer only with JSON matching the response schema.";

/// Gemini API client for highlight detection
pub struct GeminiDetector {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Shape the model is asked to answer with
#[derive(Debug, Deserialize)]
struct ProposedHighlights {
    #[serde(default)]
    highlights: Vec<ProposedHighlight>,
}

#[derive(Debug, Deserialize)]
struct ProposedHighlight {
    start_time: Option<String>,
    end_time: Option<String>,
    description: Option<String>,
}

impl GeminiDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("Gemini API key is not configured")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn build_request(source: &str, instruction: Option<&str>) -> GenerateRequest {
        let prompt = match instruction.map(str::trim).filter(|i| !i.is_empty()) {
            Some(instruction) => format!("{}\n\nUser instruction: {}", SYSTEM_PROMPT, instruction),
            None => SYSTEM_PROMPT.to_string(),
        };

        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    json!({ "file_data": { "file_uri": source } }),
                    json!({ "text": prompt }),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: json!({
                    "type": "OBJECT",
                    "properties": {
                        "highlights": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "start_time": { "type": "STRING", "nullable": true },
                                    "end_time": { "type": "STRING", "nullable": true },
                                    "description": { "type": "STRING", "nullable": true }
                                }
                            }
                        }
                    },
                    "required": ["highlights"]
                }),
            },
        }
    }

    /// Turn the model's answer into highlights; an unreadable answer means no highlights
    fn parse_highlights(response: GenerateResponse) -> Vec<Highlight> {
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let proposed: ProposedHighlights = match serde_json::from_str(strip_code_fence(&text)) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Could not parse Gemini highlight response");
                return Vec::new();
            }
        };

        proposed
            .highlights
            .into_iter()
            .map(|h| {
                Highlight::new(
                    canonical_bound(h.start_time),
                    canonical_bound(h.end_time),
                    h.description,
                )
            })
            .collect()
    }
}

/// Models occasionally wrap JSON in a markdown fence despite the mime type
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[async_trait]
impl HighlightDetector for GeminiDetector {
    async fn detect(&self, source: &str, instruction: Option<&str>) -> Result<Vec<Highlight>> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        tracing::info!(model = %self.model, "Requesting highlights for {}", source);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request(source, instruction))
            .send()
            .await
            .context("Failed to reach Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API returned HTTP {}: {}", status, body);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to decode Gemini response")?;

        let highlights = Self::parse_highlights(body);
        tracing::info!(count = highlights.len(), "Gemini proposed highlights");
        Ok(highlights)
    }
}
