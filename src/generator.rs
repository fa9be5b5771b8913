use crate::api::everyayah::EveryAyahClient;
use crate::api::quran_text::QuranTextClient;
use crate::background::BackgroundProvider;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{MediaError, MediaResult, PipelineError};
use crate::ffmpeg::{Ffmpeg, move_file};
use crate::models::{
    AudioAsset, BackgroundAsset, BackgroundStrategy, GenerationRequest, JobEvent, JobId, ProgressUpdate, Verse,
    VerseClip, final_video_name,
};
use crate::render::{TextRenderer, verse_label};
use crate::{logi, logok, logw, registry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use walkdir::WalkDir;

pub const PROGRESS_TEXT: u8 = 10;
pub const PROGRESS_AUDIO: u8 = 20;
pub const PROGRESS_BACKGROUND: u8 = 30;
pub const PROGRESS_CLIPS: u8 = 40;
pub const PROGRESS_CLIPS_SPAN: u8 = 40;
pub const PROGRESS_MERGE: u8 = 85;
pub const PROGRESS_CLEANUP: u8 = 95;
pub const PROGRESS_DONE: u8 = 100;

#[async_trait]
pub trait VerseTextSource: Send + Sync {
    async fn fetch_verses(&self, surah: u16, start: u16, end: u16, cancel: &CancelToken) -> Vec<Verse>;
}

#[async_trait]
pub trait RecitationSource: Send + Sync {
    async fn download_range(
        &self,
        reciter_id: &str,
        surah: u16,
        start: u16,
        end: u16,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Vec<AudioAsset>;
}

#[async_trait]
pub trait BackgroundSource: Send + Sync {
    /// A clip reusable across verses and jobs.
    async fn shared(&self, vision: bool, cancel: &CancelToken) -> Option<BackgroundAsset>;
    /// A fresh clip written to `out_path`.
    async fn unique(&self, out_path: &Path, vision: bool, cancel: &CancelToken) -> Option<BackgroundAsset>;
}

#[async_trait]
pub trait OverlayRenderer: Send + Sync {
    async fn render_overlay(&self, text: &str, out_png: &Path) -> Result<PathBuf>;
}

#[async_trait]
pub trait ClipAssembler: Send + Sync {
    async fn verse_clip(
        &self,
        background: &Path,
        audio: &Path,
        overlay: Option<&Path>,
        out_mp4: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf>;

    async fn merge(
        &self,
        clips: &[VerseClip],
        out_mp4: &Path,
        work_dir: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf>;

    async fn audio_duration(&self, _audio: &Path) -> Option<f64> {
        None
    }
}

#[async_trait]
impl VerseTextSource for QuranTextClient {
    async fn fetch_verses(&self, surah: u16, start: u16, end: u16, cancel: &CancelToken) -> Vec<Verse> {
        QuranTextClient::fetch_verses(self, surah, start, end, cancel).await
    }
}

#[async_trait]
impl RecitationSource for EveryAyahClient {
    async fn download_range(
        &self,
        reciter_id: &str,
        surah: u16,
        start: u16,
        end: u16,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Vec<AudioAsset> {
        EveryAyahClient::download_range(self, reciter_id, surah, start, end, out_dir, cancel).await
    }
}

#[async_trait]
impl BackgroundSource for BackgroundProvider {
    async fn shared(&self, vision: bool, cancel: &CancelToken) -> Option<BackgroundAsset> {
        self.cached_or_download(vision, cancel).await
    }

    async fn unique(&self, out_path: &Path, vision: bool, cancel: &CancelToken) -> Option<BackgroundAsset> {
        self.download_unique(out_path, vision, cancel).await
    }
}

#[async_trait]
impl ClipAssembler for Ffmpeg {
    async fn verse_clip(
        &self,
        background: &Path,
        audio: &Path,
        overlay: Option<&Path>,
        out_mp4: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf> {
        self.make_verse_clip(background, audio, overlay, out_mp4, cancel).await
    }

    async fn merge(
        &self,
        clips: &[VerseClip],
        out_mp4: &Path,
        work_dir: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf> {
        self.merge_clips(clips, out_mp4, work_dir, cancel).await
    }

    async fn audio_duration(&self, audio: &Path) -> Option<f64> {
        self.probe_duration_seconds(audio).await.ok()
    }
}

/// Rasterizes on the blocking pool.
pub struct FontOverlay {
    renderer: Arc<TextRenderer>,
}

impl FontOverlay {
    pub fn new(renderer: TextRenderer) -> Self {
        Self {
            renderer: Arc::new(renderer),
        }
    }
}

#[async_trait]
impl OverlayRenderer for FontOverlay {
    async fn render_overlay(&self, text: &str, out_png: &Path) -> Result<PathBuf> {
        let renderer = Arc::clone(&self.renderer);
        let text = text.to_string();
        let out_png = out_png.to_path_buf();
        tokio::task::spawn_blocking(move || renderer.render_to_png(&text, &out_png))
            .await
            .context("overlay render task failed")?
    }
}

/// Sends progress for one job into its registry channel.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ProgressReporter {
    pub fn new(job_id: JobId, tx: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self { job_id, tx }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn report(&self, percent: u8, message: impl Into<String>) {
        let message = message.into();
        logi(format!("[{}%] {}", percent, message));
        let _ = self.tx.send(JobEvent::Progress(ProgressUpdate {
            job_id: self.job_id,
            percent,
            message,
        }));
    }
}

pub struct PipelineParts {
    pub text: Arc<dyn VerseTextSource>,
    pub audio: Arc<dyn RecitationSource>,
    pub backgrounds: Arc<dyn BackgroundSource>,
    pub renderer: Option<Arc<dyn OverlayRenderer>>,
    pub assembler: Arc<dyn ClipAssembler>,
}

pub struct Pipeline {
    temp_dir: PathBuf,
    output_dir: PathBuf,
    parts: PipelineParts,
}

async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn ensure_dir(path: &Path) -> Result<()> {
    if !dir_exists(path).await {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create dir {}", path.display()))?;
    }
    Ok(())
}

async fn remove_directory(dir_path: &Path) -> Result<()> {
    if !dir_exists(dir_path).await {
        return Ok(());
    }

    for entry in WalkDir::new(dir_path).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            fs::remove_dir(path).await.ok();
        } else {
            fs::remove_file(path).await.ok();
        }
    }
    fs::remove_dir(dir_path)
        .await
        .with_context(|| format!("Failed to remove {}", dir_path.display()))?;
    Ok(())
}

fn clip_progress(done: usize, total: usize) -> u8 {
    let step = done * usize::from(PROGRESS_CLIPS_SPAN) / total.max(1);
    PROGRESS_CLIPS + step as u8
}

fn ensure_active(cancel: &CancelToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

/// Rejects unknown reciters and surahs and ranges outside the surah.
pub fn validate_request(request: &GenerationRequest) -> Result<(), PipelineError> {
    if registry::reciter(&request.reciter_id).is_none() {
        return Err(PipelineError::UnknownReciter(request.reciter_id.clone()));
    }
    let verses = registry::verse_count(request.surah).ok_or(PipelineError::UnknownSurah(request.surah))?;
    let (start, end) = (request.verse_start, request.verse_end);
    if start == 0 || start > end || end > verses {
        return Err(PipelineError::InvalidRange { start, end });
    }
    Ok(())
}

impl Pipeline {
    pub fn new(cfg: &Config) -> Result<Self> {
        let renderer: Option<Arc<dyn OverlayRenderer>> = match TextRenderer::new(cfg) {
            Ok(r) => Some(Arc::new(FontOverlay::new(r))),
            Err(err) => {
                logw(format!("Text overlay disabled: {:#}", err));
                None
            }
        };

        let parts = PipelineParts {
            text: Arc::new(QuranTextClient::new(cfg)?),
            audio: Arc::new(EveryAyahClient::new(cfg)?),
            backgrounds: Arc::new(BackgroundProvider::new(cfg)?),
            renderer,
            assembler: Arc::new(Ffmpeg::new(cfg)),
        };
        Ok(Self::from_parts(cfg, parts))
    }

    pub fn from_parts(cfg: &Config, parts: PipelineParts) -> Self {
        Self {
            temp_dir: cfg.temp_dir.clone(),
            output_dir: cfg.output_dir.clone(),
            parts,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn job_dir(&self, job_id: JobId) -> PathBuf {
        self.temp_dir.join(job_id.to_string())
    }

    /// Runs one job to completion. On failure a 0% report carries the reason and nothing is
    /// written to the output directory.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        progress: &ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<PathBuf, PipelineError> {
        let job_dir = self.job_dir(progress.job_id());
        let result = self.execute(request, &job_dir, progress, cancel).await;

        if let Err(err) = &result {
            logw(format!("Generation failed: {}", err));
            progress.report(0, format!("Error: {}", err));
            if let Err(cleanup) = remove_directory(&job_dir).await {
                logw(format!("Cleanup after failure incomplete: {:#}", cleanup));
            }
        }
        result
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        job_dir: &Path,
        progress: &ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<PathBuf, PipelineError> {
        validate_request(request)?;
        let reciter = registry::reciter(&request.reciter_id)
            .ok_or_else(|| PipelineError::UnknownReciter(request.reciter_id.clone()))?;
        let surah = registry::surah(request.surah).ok_or(PipelineError::UnknownSurah(request.surah))?;
        let (start, end) = (request.verse_start, request.verse_end);

        ensure_dir(job_dir).await?;

        progress.report(PROGRESS_TEXT, "Fetching verse text...");
        let verses = self.parts.text.fetch_verses(surah.number, start, end, cancel).await;
        ensure_active(cancel)?;
        if verses.is_empty() {
            return Err(PipelineError::NoVerses);
        }
        if !verses.iter().map(|v| v.number).eq(start..=end) {
            return Err(PipelineError::VerseCountMismatch {
                expected: request.verse_count(),
                got: verses.len(),
            });
        }
        logok(format!("Fetched {} verses", verses.len()));

        progress.report(PROGRESS_AUDIO, "Downloading audio...");
        let audio = self
            .parts
            .audio
            .download_range(reciter.id, surah.number, start, end, &job_dir.join("audio"), cancel)
            .await;
        ensure_active(cancel)?;
        let paired = verses.iter().zip(&audio).all(|(v, a)| v.number == a.verse);
        if audio.len() != verses.len() || !paired {
            return Err(PipelineError::AudioCountMismatch {
                expected: verses.len(),
                got: audio.len(),
            });
        }

        progress.report(PROGRESS_BACKGROUND, "Preparing background video...");
        let shared = self
            .parts
            .backgrounds
            .shared(request.vision_filter, cancel)
            .await;
        ensure_active(cancel)?;
        let shared = shared.ok_or(PipelineError::NoBackground)?;

        progress.report(PROGRESS_CLIPS, "Creating verse clips...");
        let total = verses.len();
        let mut clips = Vec::with_capacity(total);
        for (i, (verse, asset)) in verses.iter().zip(&audio).enumerate() {
            ensure_active(cancel)?;
            match self.verse_clip(request, verse, asset, &shared, job_dir, cancel).await {
                Ok(path) => clips.push(VerseClip {
                    verse: verse.number,
                    path,
                }),
                Err(MediaError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(err) => {
                    logw(format!("Clip for verse {} failed: {}", verse.number, err));
                    break;
                }
            }
            progress.report(
                clip_progress(i + 1, total),
                format!("Created clip {}/{} (verse {})", i + 1, total, verse.number),
            );
        }

        if clips.len() != total {
            return Err(PipelineError::ClipCountMismatch {
                expected: total,
                got: clips.len(),
            });
        }

        progress.report(PROGRESS_MERGE, "Merging verse clips...");
        let file_name = final_video_name(reciter, surah, start, end);
        let staged = self
            .parts
            .assembler
            .merge(&clips, &job_dir.join(&file_name), job_dir, cancel)
            .await
            .map_err(|err| match err {
                MediaError::Cancelled => PipelineError::Cancelled,
                other => PipelineError::MergeFailed(other),
            })?;

        ensure_dir(&self.output_dir).await?;
        let merged = self.output_dir.join(&file_name);
        if let Err(err) = move_file(&staged, &merged).await {
            let _ = fs::remove_file(&merged).await;
            return Err(PipelineError::MergeFailed(err));
        }

        progress.report(PROGRESS_CLEANUP, "Cleaning up temporary files...");
        if let Err(err) = remove_directory(job_dir).await {
            logw(format!("Cleanup incomplete: {:#}", err));
        }

        progress.report(PROGRESS_DONE, "Done");
        logok(format!("Final video: {}", merged.display()));
        Ok(merged)
    }

    async fn verse_clip(
        &self,
        request: &GenerationRequest,
        verse: &Verse,
        audio: &AudioAsset,
        shared: &BackgroundAsset,
        job_dir: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf> {
        let n = verse.number;

        let background = match request.background {
            BackgroundStrategy::Shared => shared.clone(),
            BackgroundStrategy::PerVerse => {
                let out = job_dir.join(format!("bg_verse_{}.mp4", n));
                match self.parts.backgrounds.unique(&out, request.vision_filter, cancel).await {
                    Some(asset) => asset,
                    None => {
                        if cancel.is_cancelled() {
                            return Err(MediaError::Cancelled);
                        }
                        logw(format!("No unique background for verse {}, reusing shared clip", n));
                        shared.clone()
                    }
                }
            }
        };

        let overlay = match (&self.parts.renderer, request.overlay_text) {
            (Some(renderer), true) => self.overlay_for(renderer.as_ref(), verse, job_dir).await,
            _ => None,
        };

        if let Some(seconds) = self.parts.assembler.audio_duration(&audio.path).await {
            logi(format!("Verse {} audio: {:.2}s", n, seconds));
        }

        let out = job_dir.join(format!("ayah_{}.mp4", n));
        self.parts
            .assembler
            .verse_clip(&background.path, &audio.path, overlay.as_deref(), &out, cancel)
            .await
    }

    async fn overlay_for(&self, renderer: &dyn OverlayRenderer, verse: &Verse, job_dir: &Path) -> Option<PathBuf> {
        let label = match verse_label(verse) {
            Ok(label) => label,
            Err(err) => {
                logw(format!("Verse {} label failed: {:#}", verse.number, err));
                return None;
            }
        };
        let out = job_dir.join(format!("verse_{}.png", verse.number));
        match renderer.render_overlay(&label, &out).await {
            Ok(path) => Some(path),
            Err(err) => {
                logw(format!("Overlay for verse {} failed, encoding without text: {:#}", verse.number, err));
                None
            }
        }
    }
}
