use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::config::{Builder, Credentials};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::path::Path;
use uuid::Uuid;

use super::ArtifactPublisher;
use crate::config::Config;
use crate::utils::video_mime_type;
use crate::Result;

/// Publishes clips to S3 or an S3-compatible store such as R2
pub struct S3Publisher {
    client: S3Client,
    bucket: String,
    key_prefix: String,
    public_base_url: Option<String>,
}

impl S3Publisher {
    /// Build the client from configuration.
    ///
    /// Static credentials and path-style addressing are used when an endpoint
    /// is configured; otherwise the default AWS credential chain applies.
    pub async fn new(config: &Config) -> Result<Self> {
        let storage = &config.storage;

        let client = match &storage.endpoint_url {
            Some(endpoint) => {
                let access_key = storage
                    .access_key_id
                    .as_deref()
                    .context("Storage access key id is required with a custom endpoint")?;
                let secret = storage
                    .secret_access_key
                    .as_deref()
                    .context("Storage secret access key is required with a custom endpoint")?;

                let credentials = Credentials::new(access_key, secret, None, None, "clipper");
                let s3_config = Builder::new()
                    .behavior_version(aws_config::BehaviorVersion::latest())
                    .endpoint_url(endpoint)
                    .region(config.storage_region())
                    .credentials_provider(credentials)
                    .force_path_style(true)
                    .build();

                S3Client::from_conf(s3_config)
            }
            None => {
                let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(config.storage_region())
                    .load()
                    .await;
                S3Client::new(&aws_config)
            }
        };

        Ok(Self {
            client,
            bucket: storage.bucket.clone(),
            key_prefix: storage.key_prefix.clone().unwrap_or_default(),
            public_base_url: storage
                .public_base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    /// Object key for a clip; the random segment keeps runs over the same source apart
    fn object_key(&self, local_path: &Path) -> Result<String> {
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("Clip path has no file name: {}", local_path.display()))?;

        Ok(format!("{}{}/{}", self.key_prefix, Uuid::new_v4(), file_name))
    }

    fn url_for(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, key),
            None => format!("{}/{}", self.bucket, key),
        }
    }
}

#[async_trait]
impl ArtifactPublisher for S3Publisher {
    async fn publish(&self, local_path: &Path) -> Result<String> {
        let key = self.object_key(local_path)?;

        tracing::info!("Uploading clip to s3://{}/{}", self.bucket, key);

        let body = ByteStream::from_path(local_path)
            .await
            .with_context(|| format!("Failed to read clip {}", local_path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body)
            .content_type(video_mime_type(local_path))
            .send()
            .await
            .context("Failed to upload clip")?;

        Ok(self.url_for(&key))
    }
}
