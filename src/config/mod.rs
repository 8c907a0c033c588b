use anyhow::{Context, Result};
use aws_types::region::Region;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Video-understanding model settings
    pub detector: DetectorConfig,

    /// Object storage for published clips
    pub storage: StorageConfig,

    /// Where highlight metadata is recorded
    pub metadata: MetadataConfig,

    /// Clip extraction settings
    pub extraction: ExtractionConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Gemini model name
    pub model: String,

    /// API key (GOOGLE_GENAI_API_KEY overrides)
    pub api_key: Option<String>,

    /// Base URL of the generative language API
    pub endpoint: String,

    /// Request timeout in seconds; video analysis can take minutes
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// S3-compatible endpoint (R2, MinIO); AWS default when unset
    pub endpoint_url: Option<String>,

    /// Region ("auto" for R2)
    pub region: String,

    /// Bucket for published clips
    pub bucket: String,

    /// Optional key prefix
    pub key_prefix: Option<String>,

    /// Public base URL used to build clip URLs
    pub public_base_url: Option<String>,

    /// Access key (R2_ACCESS_KEY_ID overrides)
    pub access_key_id: Option<String>,

    /// Secret key (R2_SECRET_ACCESS_KEY overrides)
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    Local,
    Firestore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,

    /// Directory for the local JSON backend
    pub local_dir: Option<PathBuf>,

    /// Firestore project id
    pub project_id: Option<String>,

    /// Firestore database id
    pub database_id: String,

    /// Bearer token (FIRESTORE_ACCESS_TOKEN overrides)
    pub access_token: Option<String>,

    pub highlights_collection: String,

    pub clip_urls_collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// ffmpeg binary
    pub ffmpeg_path: String,

    /// Seconds added past the nominal end on the first, stream-copy attempt
    pub trailing_pad_secs: u64,

    /// Maximum extraction processes per run (available parallelism when unset)
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Working directory for downloads and clips (system temp dir when unset)
    pub work_dir: Option<PathBuf>,

    /// Keep extracted clips after they are published
    pub keep_clips: bool,

    /// yt-dlp binary
    pub yt_dlp_path: String,

    /// Cookies file passed to yt-dlp
    pub cookies_file: Option<PathBuf>,

    /// Maximum pipeline runs executing at once in batch mode
    pub max_concurrent_runs: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 600,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: "auto".to_string(),
            bucket: String::new(),
            key_prefix: Some("clips/".to_string()),
            public_base_url: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::Local,
            local_dir: None,
            project_id: None,
            database_id: "(default)".to_string(),
            access_token: None,
            highlights_collection: "video_highlights".to_string(),
            clip_urls_collection: "video_clip_urls".to_string(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            trailing_pad_secs: 10,
            max_concurrent: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            keep_clips: false,
            yt_dlp_path: "yt-dlp".to_string(),
            cookies_file: None,
            max_concurrent_runs: 2,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str(&content).context("Failed to parse config file")?
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("clipper.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("highlight-clipper").join("config.yaml"))
    }

    /// Secrets from the environment take precedence over the file
    fn apply_env(&mut self) {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(key) = env("GOOGLE_GENAI_API_KEY") {
            self.detector.api_key = Some(key);
        }
        if let Some(key) = env("R2_ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(key);
        }
        if let Some(secret) = env("R2_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Some(secret);
        }
        if let Some(token) = env("FIRESTORE_ACCESS_TOKEN") {
            self.metadata.access_token = Some(token);
        }
    }

    /// Validate the fields a full pipeline run depends on
    pub fn validate(&self) -> Result<()> {
        if self.detector.api_key.is_none() {
            anyhow::bail!("Gemini API key must be configured (detector.api_key or GOOGLE_GENAI_API_KEY)");
        }

        if self.storage.bucket.is_empty() {
            anyhow::bail!("Storage bucket must be configured");
        }

        if self.storage.access_key_id.is_some() != self.storage.secret_access_key.is_some() {
            anyhow::bail!("Storage access key id and secret must be configured together");
        }

        if self.metadata.backend == MetadataBackend::Firestore {
            if self.metadata.project_id.is_none() {
                anyhow::bail!("Firestore project id must be configured");
            }
            if self.metadata.access_token.is_none() {
                anyhow::bail!("Firestore access token must be configured (FIRESTORE_ACCESS_TOKEN)");
            }
        }

        if self.extraction.max_concurrent == Some(0) || self.app.max_concurrent_runs == 0 {
            anyhow::bail!("Concurrency limits must be at least 1");
        }

        Ok(())
    }

    /// Working directory for downloads and clips
    pub fn work_dir(&self) -> PathBuf {
        self.app
            .work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("highlight-clipper"))
    }

    /// Directory used by the local metadata backend
    pub fn metadata_dir(&self) -> PathBuf {
        self.metadata
            .local_dir
            .clone()
            .unwrap_or_else(|| self.work_dir().join("metadata"))
    }

    /// Extraction pool size
    pub fn extraction_concurrency(&self) -> usize {
        self.extraction.max_concurrent.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Storage region
    pub fn storage_region(&self) -> Region {
        Region::new(self.storage.region.clone())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Detector Model: {}", self.detector.model);
        println!("  Detector API Key: {}", mask(self.detector.api_key.is_some()));
        println!("  Storage Bucket: {}", self.storage.bucket);
        println!("  Storage Region: {}", self.storage.region);
        if let Some(endpoint) = &self.storage.endpoint_url {
            println!("  Storage Endpoint: {}", endpoint);
        }
        if let Some(prefix) = &self.storage.key_prefix {
            println!("  Storage Prefix: {}", prefix);
        }
        println!("  Metadata Backend: {:?}", self.metadata.backend);
        println!("  Trailing Pad: {}s", self.extraction.trailing_pad_secs);
        println!("  Extraction Workers: {}", self.extraction_concurrency());
        println!("  Work Dir: {}", self.work_dir().display());
        println!("  Keep Clips: {}", self.app.keep_clips);
    }
}

fn mask(present: bool) -> &'static str {
    if present {
        "********"
    } else {
        "(not set)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable() -> Config {
        let mut config = Config::default();
        config.detector.api_key = Some("key".into());
        config.storage.bucket = "clips".into();
        config
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "storage:\n  bucket: my-bucket\nextraction:\n  trailing_pad_secs: 5\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.storage.bucket, "my-bucket");
        assert_eq!(config.storage.region, "auto");
        assert_eq!(config.extraction.trailing_pad_secs, 5);
        assert_eq!(config.extraction.ffmpeg_path, "ffmpeg");
        assert_eq!(config.metadata.backend, MetadataBackend::Local);
    }

    #[test]
    fn test_validate_requires_bucket_and_key() {
        assert!(Config::default().validate().is_err());
        assert!(runnable().validate().is_ok());

        let mut no_bucket = runnable();
        no_bucket.storage.bucket.clear();
        assert!(no_bucket.validate().is_err());
    }

    #[test]
    fn test_validate_firestore_backend() {
        let mut config = runnable();
        config.metadata.backend = MetadataBackend::Firestore;
        assert!(config.validate().is_err());

        config.metadata.project_id = Some("proj".into());
        config.metadata.access_token = Some("token".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_half_credentials() {
        let mut config = runnable();
        config.storage.access_key_id = Some("id".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extraction_concurrency_defaults_to_host() {
        let mut config = runnable();
        assert!(config.extraction_concurrency() >= 1);

        config.extraction.max_concurrent = Some(3);
        assert_eq!(config.extraction_concurrency(), 3);
    }
}
