use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One verse as returned by the text service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    pub surah: u16,
    pub number: u16,
    pub text: String,
    pub surah_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reciter {
    pub id: &'static str,
    pub name_ar: &'static str,
    pub name_en: &'static str,
    pub folder: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Surah {
    pub number: u16,
    pub name: &'static str,
}

/// Downloaded recitation for one verse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAsset {
    pub verse: u16,
    pub path: PathBuf,
}

/// A background clip on disk. `cached` clips live in the shared cache and survive cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundAsset {
    pub path: PathBuf,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseClip {
    pub verse: u16,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStrategy {
    /// One clip reused across every verse.
    #[default]
    Shared,
    /// A fresh clip per verse, falling back to the shared one.
    PerVerse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub reciter_id: String,
    pub surah: u16,
    pub verse_start: u16,
    pub verse_end: u16,
    #[serde(default)]
    pub background: BackgroundStrategy,
    #[serde(default = "default_true")]
    pub overlay_text: bool,
    #[serde(default)]
    pub vision_filter: bool,
}

fn default_true() -> bool {
    true
}

impl GenerationRequest {
    pub fn new(reciter_id: impl Into<String>, surah: u16, verse_start: u16, verse_end: u16) -> Self {
        Self {
            reciter_id: reciter_id.into(),
            surah,
            verse_start,
            verse_end,
            background: BackgroundStrategy::default(),
            overlay_text: true,
            vision_filter: false,
        }
    }

    pub fn verse_count(&self) -> usize {
        usize::from(self.verse_end.saturating_sub(self.verse_start)) + 1
    }
}

/// Deterministic output file name for a finished job.
pub fn final_video_name(reciter: &Reciter, surah: &Surah, verse_start: u16, verse_end: u16) -> String {
    format!(
        "{}_{}_verse{}-{}.mp4",
        reciter.name_en.replace(' ', "_"),
        surah.name,
        verse_start,
        verse_end
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

pub type JobId = Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub id: JobId,
    pub request: GenerationRequest,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub result: Option<PathBuf>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    pub fn new(id: JobId, request: GenerationRequest) -> Self {
        Self {
            id,
            request,
            status: JobStatus::Processing,
            progress: 0,
            message: "queued".to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// One progress report pushed by a running pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub percent: u8,
    pub message: String,
}

/// Everything a running job tells its registry, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Progress(ProgressUpdate),
    Finished {
        job_id: JobId,
        outcome: Result<PathBuf, String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_video_name() {
        let reciter = Reciter {
            id: "abdul_basit",
            name_ar: "عبد الباسط عبد الصمد - مرتل",
            name_en: "Abdul Basit - Murattal",
            folder: "Abdul_Basit_Murattal_192kbps",
        };
        let surah = Surah { number: 1, name: "الفاتحة" };
        assert_eq!(
            final_video_name(&reciter, &surah, 1, 3),
            "Abdul_Basit_-_Murattal_الفاتحة_verse1-3.mp4"
        );
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"reciter_id":"ghamadi","surah":112,"verse_start":1,"verse_end":4}"#,
        )
        .unwrap();
        assert_eq!(req.background, BackgroundStrategy::Shared);
        assert!(req.overlay_text);
        assert!(!req.vision_filter);
        assert_eq!(req.verse_count(), 4);
    }

    #[test]
    fn test_terminal_status() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
