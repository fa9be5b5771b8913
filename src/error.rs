//! Error types for encoding and pipeline steps.

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// Failures of an external encoder invocation.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid media duration")]
    InvalidDuration,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn ffmpeg_failed(message: impl Into<String>, stderr: Option<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}

/// Job-level failures. Each maps to one guard of the generation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown reciter: {0}")]
    UnknownReciter(String),

    #[error("unknown surah: {0}")]
    UnknownSurah(u16),

    #[error("invalid verse range {start}-{end}")]
    InvalidRange { start: u16, end: u16 },

    #[error("failed to fetch verse text")]
    NoVerses,

    #[error("verse text incomplete: expected {expected}, got {got}")]
    VerseCountMismatch { expected: usize, got: usize },

    #[error("audio download incomplete: expected {expected}, got {got}")]
    AudioCountMismatch { expected: usize, got: usize },

    #[error("failed to prepare background video")]
    NoBackground,

    #[error("verse clip creation incomplete: expected {expected}, got {got}")]
    ClipCountMismatch { expected: usize, got: usize },

    #[error("failed to merge verse clips")]
    MergeFailed(#[source] MediaError),

    #[error("job cancelled")]
    Cancelled,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures of the optional vision classifier. Every variant rejects the candidate.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("vision API key missing")]
    MissingKey,

    #[error("vision request failed: {0}")]
    Http(String),

    #[error("vision response carried no text")]
    NoText,

    #[error("vision response malformed: {0}")]
    Malformed(String),
}
