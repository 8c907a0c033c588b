use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod firestore;
pub mod local;

pub use firestore::FirestoreRecorder;
pub use local::JsonFileRecorder;

use crate::highlights::{Highlight, HighlightId};
use crate::Result;

/// Persists the detected highlights and the highlight-to-clip mapping of a source
#[async_trait]
pub trait MetadataRecorder: Send + Sync {
    async fn record_highlights(&self, source_id: &str, highlights: &[Highlight]) -> Result<()>;

    async fn record_artifact_map(
        &self,
        source_id: &str,
        mapping: &BTreeMap<HighlightId, String>,
    ) -> Result<()>;
}

/// Document id for a source; source ids are usually URLs, which contain '/'
pub fn document_id(source_id: &str) -> String {
    urlencoding::encode(source_id).into_owned()
}
