//! Firestore REST recorder.
//!
//! Documents are written with `PATCH .../documents/{collection}/{id}`, which
//! creates or replaces the document. Values use Firestore's typed JSON encoding.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{document_id, MetadataRecorder};
use crate::config::MetadataConfig;
use crate::highlights::{Highlight, HighlightId};
use crate::Result;

const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";

pub struct FirestoreRecorder {
    client: Client,
    base_url: String,
    access_token: String,
    highlights_collection: String,
    clip_urls_collection: String,
}

impl FirestoreRecorder {
    pub fn new(config: &MetadataConfig) -> Result<Self> {
        let project_id = config
            .project_id
            .as_deref()
            .context("Firestore project id is not configured")?;
        let access_token = config
            .access_token
            .clone()
            .context("Firestore access token is not configured")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/projects/{}/databases/{}/documents",
                FIRESTORE_API, project_id, config.database_id
            ),
            access_token,
            highlights_collection: config.highlights_collection.clone(),
            clip_urls_collection: config.clip_urls_collection.clone(),
        })
    }

    fn document_url(&self, collection: &str, source_id: &str) -> String {
        // The document id is itself percent-encoded, so encode it again for the path
        let id = document_id(source_id);
        format!("{}/{}/{}", self.base_url, collection, urlencoding::encode(&id))
    }

    async fn write_document(&self, url: &str, fields: Map<String, Value>) -> Result<()> {
        let response = self
            .client
            .patch(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .context("Failed to reach Firestore")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Firestore write failed with HTTP {}: {}", status, body);
        }

        tracing::debug!("Wrote Firestore document {}", url);
        Ok(())
    }
}

/// Encode a plain JSON value as a Firestore typed value
fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n.as_f64() }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": to_firestore_fields(map) } }),
    }
}

fn to_firestore_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), to_firestore_value(value)))
        .collect()
}

fn timestamp_field() -> Value {
    json!({ "timestampValue": chrono::Utc::now().to_rfc3339() })
}

#[async_trait]
impl MetadataRecorder for FirestoreRecorder {
    async fn record_highlights(&self, source_id: &str, highlights: &[Highlight]) -> Result<()> {
        let mut fields = Map::new();
        fields.insert(
            "highlights".to_string(),
            to_firestore_value(&serde_json::to_value(highlights)?),
        );
        fields.insert("source_id".to_string(), to_firestore_value(&json!(source_id)));
        fields.insert("recorded_at".to_string(), timestamp_field());

        let url = self.document_url(&self.highlights_collection, source_id);
        self.write_document(&url, fields).await
    }

    async fn record_artifact_map(
        &self,
        source_id: &str,
        mapping: &BTreeMap<HighlightId, String>,
    ) -> Result<()> {
        let mut fields = Map::new();
        fields.insert(
            "highlight_to_url".to_string(),
            to_firestore_value(&serde_json::to_value(mapping)?),
        );
        fields.insert("source_id".to_string(), to_firestore_value(&json!(source_id)));
        fields.insert("recorded_at".to_string(), timestamp_field());

        let url = self.document_url(&self.clip_urls_collection, source_id);
        self.write_document(&url, fields).await
    }
}
