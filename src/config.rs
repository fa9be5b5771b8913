use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const ENV_PEXELS_KEY: &str = "PEXELS_API_KEY";
const ENV_GEMINI_KEY: &str = "GEMINI_API_KEY";
const ENV_OUTPUT_DIR: &str = "QURAN_SHORTS_OUTPUT_DIR";
const ENV_TEMP_DIR: &str = "QURAN_SHORTS_TEMP_DIR";
const ENV_BACKGROUNDS_DIR: &str = "QURAN_SHORTS_BACKGROUNDS_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "pexels_api_key")]
    pub pexels_key: String,
    #[serde(rename = "gemini_api_key")]
    pub gemini_key: String,
    pub text_api_base: String,
    pub audio_base: String,
    pub pexels_base: String,
    pub vision_base: String,
    pub vision_model: String,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backgrounds_dir: PathBuf,
    pub video: VideoSettings,
    pub text: TextSettings,
    pub background: BackgroundSettings,
    pub timeouts: Timeouts,
    pub worker_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub audio_bitrate: String,
    pub video_codec: String,
    pub video_quality: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAnchor {
    Center,
    LowerThird,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    pub font_size: f32,
    pub outline_width: i32,
    pub anchor: TextAnchor,
    pub padding: u32,
    pub line_spacing: u32,
    pub font_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSettings {
    pub orientation: String,
    pub per_page: u32,
    pub max_attempts: u32,
}

/// Wall-clock limits, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub text: u64,
    pub audio: u64,
    pub search: u64,
    pub download: u64,
    pub vision: u64,
    pub version_check: u64,
    pub frame: u64,
    pub clip: u64,
    pub concat: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pexels_key: String::new(),
            gemini_key: String::new(),
            text_api_base: "https://api.alquran.cloud/v1".to_string(),
            audio_base: "https://everyayah.com/data".to_string(),
            pexels_base: "https://api.pexels.com/videos".to_string(),
            vision_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            vision_model: "gemini-1.5-flash".to_string(),
            temp_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("output"),
            backgrounds_dir: PathBuf::from("backgrounds"),
            video: VideoSettings::default(),
            text: TextSettings::default(),
            background: BackgroundSettings::default(),
            timeouts: Timeouts::default(),
            worker_count: 2,
        }
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            audio_bitrate: "192k".to_string(),
            video_codec: "mpeg4".to_string(),
            video_quality: 3,
        }
    }
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            font_size: 70.0,
            outline_width: 5,
            anchor: TextAnchor::Center,
            padding: 40,
            line_spacing: 20,
            font_paths: default_font_paths(),
        }
    }
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            orientation: "portrait".to_string(),
            per_page: 20,
            max_attempts: 10,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            text: 10,
            audio: 15,
            search: 10,
            download: 30,
            vision: 60,
            version_check: 5,
            frame: 30,
            clip: 120,
            concat: 300,
        }
    }
}

/// Arabic-capable fonts in preference order: bundled first, then common system locations.
fn default_font_paths() -> Vec<PathBuf> {
    [
        "fonts/Amiri-Regular.ttf",
        "fonts/Scheherazade-Regular.ttf",
        "fonts/NotoNaskhArabic-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoNaskhArabic-Regular.ttf",
        "/usr/share/fonts/opentype/noto/NotoNaskhArabic-Regular.ttf",
        "/usr/share/fonts/truetype/fonts-arabeyes/ae_AlMohanad.ttf",
        "/Library/Fonts/Arial Unicode.ttf",
        "C:\\Windows\\Fonts\\simpo.ttf",
        "C:\\Windows\\Fonts\\tahoma.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

impl Config {
    /// Reads `path` when it exists, then applies environment overrides.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if fs::metadata(path).await.is_ok() {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty(ENV_PEXELS_KEY) {
            self.pexels_key = v;
        }
        if let Some(v) = non_empty(ENV_GEMINI_KEY) {
            self.gemini_key = v;
        }
        if let Some(v) = non_empty(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(ENV_TEMP_DIR) {
            self.temp_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(ENV_BACKGROUNDS_DIR) {
            self.backgrounds_dir = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.video.width == 0 || self.video.height == 0 {
            anyhow::bail!("config: video width/height must be positive");
        }
        if self.video.fps == 0 {
            anyhow::bail!("config: video fps must be positive");
        }
        if self.worker_count == 0 {
            anyhow::bail!("config: worker_count must be at least 1");
        }
        if self.background.max_attempts == 0 {
            anyhow::bail!("config: background.max_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.video.width, 1080);
        assert_eq!(cfg.video.height, 1920);
        assert_eq!(cfg.video.fps, 30);
        assert_eq!(cfg.video.audio_bitrate, "192k");
        assert_eq!(cfg.background.orientation, "portrait");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{"pexels_api_key":"abc","video":{"fps":25},"text":{"anchor":"lower_third"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.pexels_key, "abc");
        assert_eq!(cfg.video.fps, 25);
        assert_eq!(cfg.video.width, 1080);
        assert_eq!(cfg.text.anchor, TextAnchor::LowerThird);
        assert_eq!(cfg.timeouts.clip, 120);
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env(|key| match key {
            "PEXELS_API_KEY" => Some("from-env".to_string()),
            "QURAN_SHORTS_OUTPUT_DIR" => Some("/tmp/out".to_string()),
            "GEMINI_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(cfg.pexels_key, "from-env");
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert!(cfg.gemini_key.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let cfg = Config {
            worker_count: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path().join("absent.json")).await.unwrap();
        assert_eq!(cfg.video.height, 1920);
    }

    #[tokio::test]
    async fn test_load_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").await.unwrap();
        assert!(Config::load(&path).await.is_err());
    }
}
