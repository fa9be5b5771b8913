//! Pexels stock-video search and download.

use crate::api::USER_AGENT;
use crate::config::Config;
use crate::logi;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time;

#[derive(Debug, Clone, Deserialize)]
pub struct PexelsVideo {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub video_files: Vec<VideoFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoFile {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub link: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

pub struct PexelsClient {
    pub client: reqwest::Client,
    api_key: String,
    base: String,
    search_timeout: Duration,
    download_timeout: Duration,
}

impl PexelsClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: reqwest::Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.pexels_key.clone(),
            base: cfg.pexels_base.trim_end_matches('/').to_string(),
            search_timeout: Duration::from_secs(cfg.timeouts.search),
            download_timeout: Duration::from_secs(cfg.timeouts.download),
        }
    }

    pub async fn search(&self, query: &str, orientation: &str, per_page: u32) -> Result<Vec<PexelsVideo>> {
        let url = format!("{}/search", self.base);
        let per_page = per_page.to_string();
        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("orientation", orientation),
                ("size", "medium"),
                ("per_page", per_page.as_str()),
            ])
            .timeout(self.search_timeout)
            .send()
            .await
            .context("Pexels search request failed")?
            .error_for_status()
            .context("Pexels search HTTP error")?;

        let body: SearchResponse = resp.json().await.context("Pexels search body invalid")?;
        Ok(body.videos)
    }

    /// Streams `url` to `out_path`. With `limit`, stops after that many bytes.
    ///
    /// Bytes land in `{out_path}.part` and are renamed into place only once the body is
    /// complete. The download timeout bounds the response headers and each body read, not
    /// the whole transfer.
    pub async fn download(&self, url: &str, out_path: &Path, limit: Option<u64>) -> Result<PathBuf> {
        let send = self.client.get(url).send();
        let mut resp = time::timeout(self.download_timeout, send)
            .await
            .context("video download timed out waiting for response")?
            .context("video download request failed")?
            .error_for_status()
            .context("video download HTTP error")?;

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }

        let part = PartFile::new(out_path);
        let mut out = fs::File::create(part.path())
            .await
            .with_context(|| format!("create video file: {}", part.path().display()))?;
        let mut written: u64 = 0;
        loop {
            let chunk = time::timeout(self.download_timeout, resp.chunk())
                .await
                .context("video download stalled")?
                .context("video download interrupted")?;
            let Some(chunk) = chunk else {
                break;
            };
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if limit.is_some_and(|max| written >= max) {
                break;
            }
        }
        out.flush().await?;
        drop(out);

        if written == 0 {
            anyhow::bail!("video download returned an empty body: {url}");
        }

        part.persist(out_path).await?;
        logi(format!("Downloaded video to {} ({} bytes)", out_path.display(), written));
        Ok(out_path.to_path_buf())
    }
}

/// In-progress download file, removed on drop unless persisted. A failed or abandoned
/// download never leaves a truncated clip under the final name.
struct PartFile {
    path: PathBuf,
    keep: bool,
}

impl PartFile {
    fn new(out_path: &Path) -> Self {
        let mut name = out_path.as_os_str().to_os_string();
        name.push(".part");
        Self {
            path: PathBuf::from(name),
            keep: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(mut self, out_path: &Path) -> Result<()> {
        fs::rename(&self.path, out_path)
            .await
            .with_context(|| format!("Failed to move {} into place", self.path.display()))?;
        self.keep = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
