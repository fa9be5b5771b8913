use crate::config::Config;
use crate::ffmpeg::Ffmpeg;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use tokio::fs;

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in [&cfg.temp_dir, &cfg.output_dir, &cfg.backgrounds_dir] {
        if fs::metadata(dir).await.is_err() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create dir {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

/// Runs `ffmpeg -version` under the version-check timeout.
pub async fn check_ffmpeg(cfg: &Config) -> bool {
    match Ffmpeg::new(cfg).version().await {
        Ok(version) => {
            logok(version);
            true
        }
        Err(err) => {
            logw(format!("FFmpeg unavailable ({}). Please install FFmpeg.", err));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_directories_creates_all() {
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            temp_dir: dir.path().join("temp"),
            output_dir: dir.path().join("out").join("videos"),
            backgrounds_dir: dir.path().join("backgrounds"),
            ..Config::default()
        };
        ensure_directories(&cfg).await.unwrap();
        ensure_directories(&cfg).await.unwrap();
        assert!(cfg.temp_dir.is_dir());
        assert!(cfg.output_dir.is_dir());
        assert!(cfg.backgrounds_dir.is_dir());
    }
}
