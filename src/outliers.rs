//! Outlier data sources.
//!
//! The outliers list is computed elsewhere; this module only fetches it.
//! Each call to [`OutlierSource::fetch`] is a single attempt with no retry.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::DataConfig;
use crate::models::Video;

/// Anything that can produce the current list of outlier videos.
#[async_trait]
pub trait OutlierSource: Send + Sync {
    /// Short label used in log lines.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<Video>>;
}

/// Fetches `GET <outliers_url>` and decodes a JSON array of videos.
pub struct HttpOutlierSource {
    client: reqwest::Client,
    url: String,
}

impl HttpOutlierSource {
    pub fn new(config: &DataConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: config.outliers_url.clone(),
        })
    }
}

#[async_trait]
impl OutlierSource for HttpOutlierSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<Video>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("GET {} returned {}: {}", self.url, status, body);
        }

        let videos: Vec<Video> = resp
            .json()
            .await
            .with_context(|| format!("GET {} returned malformed JSON", self.url))?;
        Ok(videos)
    }
}

/// Reads the list from a JSON file on disk, e.g. a saved API response.
pub struct FileOutlierSource {
    path: PathBuf,
}

impl FileOutlierSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OutlierSource for FileOutlierSource {
    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn fetch(&self) -> Result<Vec<Video>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let videos: Vec<Video> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(videos)
    }
}
