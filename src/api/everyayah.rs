//! Per-verse recitation audio from everyayah.com.

use crate::api::USER_AGENT;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::models::AudioAsset;
use crate::registry;
use crate::{logi, logok, logw};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub struct EveryAyahClient {
    pub client: reqwest::Client,
    base: String,
    timeout: Duration,
}

pub fn audio_file_name(surah: u16, verse: u16) -> String {
    format!("{:03}{:03}.mp3", surah, verse)
}

impl EveryAyahClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: reqwest::Client, cfg: &Config) -> Self {
        Self {
            client,
            base: cfg.audio_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(cfg.timeouts.audio),
        }
    }

    /// `None` when the reciter is not in the registry.
    pub fn audio_url(&self, reciter_id: &str, surah: u16, verse: u16) -> Option<String> {
        let reciter = registry::reciter(reciter_id)?;
        Some(format!("{}/{}/{}", self.base, reciter.folder, audio_file_name(surah, verse)))
    }

    pub async fn download_audio(
        &self,
        reciter_id: &str,
        surah: u16,
        verse: u16,
        out_path: &Path,
    ) -> Result<PathBuf> {
        let url = self
            .audio_url(reciter_id, surah, verse)
            .ok_or_else(|| anyhow!("Invalid reciter ID: {reciter_id}"))?;

        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("audio request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("audio HTTP error: {url}"))?;

        let bytes = resp.bytes().await.context("audio response read failed")?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(out_path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", out_path.display()))?;

        Ok(out_path.to_path_buf())
    }

    /// Downloads every verse in order. Failed verses are logged and left out, so callers
    /// must compare the returned length against the range.
    pub async fn download_range(
        &self,
        reciter_id: &str,
        surah: u16,
        verse_start: u16,
        verse_end: u16,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Vec<AudioAsset> {
        let mut assets = Vec::new();
        for verse in verse_start..=verse_end {
            let out_path = out_dir.join(audio_file_name(surah, verse));
            let fut = self.download_audio(reciter_id, surah, verse, &out_path);
            match cancel.run(fut).await {
                Some(Ok(path)) => {
                    logok(format!("Downloaded audio: {}", audio_file_name(surah, verse)));
                    assets.push(AudioAsset { verse, path });
                }
                Some(Err(err)) => logw(format!("Failed to download verse {}: {:#}", verse, err)),
                None => {
                    logw("Audio download cancelled");
                    break;
                }
            }
        }
        logi(format!("Downloaded {} audio files", assets.len()));
        assets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_with_base(base: String) -> EveryAyahClient {
        let cfg = Config {
            audio_base: base,
            ..Config::default()
        };
        EveryAyahClient::new(&cfg).unwrap()
    }

    #[test]
    fn test_audio_url_zero_padded() {
        let client = client_with_base("https://everyayah.com/data".to_string());
        assert_eq!(
            client.audio_url("abdul_basit", 1, 7).as_deref(),
            Some("https://everyayah.com/data/Abdul_Basit_Murattal_192kbps/001007.mp3")
        );
        assert_eq!(
            client.audio_url("alafasy_128", 114, 6).as_deref(),
            Some("https://everyayah.com/data/Alafasy_128kbps/114006.mp3")
        );
        assert_eq!(client.audio_url("unknown", 1, 1), None);
    }

    #[tokio::test]
    async fn test_download_range_skips_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Alafasy_128kbps/001001.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3one".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Alafasy_128kbps/001002.mp3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Alafasy_128kbps/001003.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3three".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let client = client_with_base(server.uri());
        let assets = client
            .download_range("alafasy_128", 1, 1, 3, dir.path(), &CancelToken::never())
            .await;

        assert_eq!(assets.iter().map(|a| a.verse).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(fs::read(&assets[1].path).await.unwrap(), b"ID3three");
        assert!(assets[0].path.ends_with("001001.mp3"));
    }

    #[tokio::test]
    async fn test_unknown_reciter_fails() {
        let dir = TempDir::new().unwrap();
        let client = client_with_base("http://127.0.0.1:9".to_string());
        let err = client
            .download_audio("nobody", 1, 1, &dir.path().join("x.mp3"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid reciter"));
    }
}
