//! Background footage: keyword search, denylist filtering, selection, caching and the
//! optional vision gate.

use crate::api::pexels::{PexelsClient, PexelsVideo, VideoFile};
use crate::api::vision::{FrameClassifier, GeminiVision};
use crate::cancel::{CancelToken, cancel_pair};
use crate::config::{BackgroundSettings, Config};
use crate::ffmpeg::Ffmpeg;
use crate::models::BackgroundAsset;
use crate::registry::{DENYLIST, FALLBACK_KEYWORD, SEARCH_KEYWORDS};
use crate::{logi, logok, logw};
use anyhow::Result;
use rand::Rng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use walkdir::WalkDir;

const MAX_HD_WIDTH: u32 = 1080;
const PROBE_BYTES: u64 = 2 * 1024 * 1024;
const PROBE_TIMESTAMP: &str = "00:00:02";

/// Case-insensitive substring check of tags and page URL against `denylist`.
pub fn is_safe(video: &PexelsVideo, denylist: &[&str]) -> bool {
    let tags = video.tags.join(" ").to_lowercase();
    let url = video.url.to_lowercase();
    !denylist.iter().any(|word| tags.contains(word) || url.contains(word))
}

/// An `hd` file no wider than 1080px, else the first file listed.
pub fn pick_file(video: &PexelsVideo) -> Option<&VideoFile> {
    video
        .video_files
        .iter()
        .find(|f| f.quality.as_deref() == Some("hd") && f.width.is_some_and(|w| w <= MAX_HD_WIDTH))
        .or_else(|| video.video_files.first())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: u64,
    pub link: String,
}

/// Shuffles `videos` and returns every safe one with a downloadable file, in shuffled order.
pub fn safe_candidates<R: Rng + ?Sized>(videos: &mut [PexelsVideo], rng: &mut R) -> Vec<Candidate> {
    videos.shuffle(rng);
    videos
        .iter()
        .filter(|v| is_safe(v, DENYLIST))
        .filter_map(|v| {
            pick_file(v).map(|f| Candidate {
                id: v.id,
                link: f.link.clone(),
            })
        })
        .collect()
}

pub fn select_candidate<R: Rng + ?Sized>(videos: &mut [PexelsVideo], rng: &mut R) -> Option<Candidate> {
    safe_candidates(videos, rng).into_iter().next()
}

pub fn cache_file_name(id: u64) -> String {
    format!("pexels_{}.mp4", id)
}

/// `pexels_*.mp4` files directly inside `dir`.
pub fn cached_clips(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            name.starts_with("pexels_") && name.ends_with(".mp4")
        })
        .map(|e| e.into_path())
        .collect()
}

/// Any classifier error rejects the frame.
pub async fn accept_frame(classifier: &dyn FrameClassifier, jpeg: &[u8]) -> bool {
    match classifier.classify(jpeg).await {
        Ok(analysis) if analysis.is_acceptable() => {
            logok(format!("Frame accepted: {} ({})", analysis.description, analysis.category));
            true
        }
        Ok(analysis) => {
            logw(format!(
                "Frame rejected: humans={} animals={} appropriate={}",
                analysis.has_humans, analysis.has_animals, analysis.is_appropriate
            ));
            false
        }
        Err(err) => {
            logw(format!("Frame analysis failed, rejecting: {}", err));
            false
        }
    }
}

pub struct BackgroundProvider {
    pexels: PexelsClient,
    ffmpeg: Ffmpeg,
    classifier: Arc<dyn FrameClassifier>,
    cache_dir: PathBuf,
    scratch_dir: PathBuf,
    settings: BackgroundSettings,
}

impl BackgroundProvider {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            pexels: PexelsClient::new(cfg)?,
            ffmpeg: Ffmpeg::new(cfg),
            classifier: Arc::new(GeminiVision::new(cfg)?),
            cache_dir: cfg.backgrounds_dir.clone(),
            scratch_dir: cfg.temp_dir.join("vision"),
            settings: cfg.background.clone(),
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FrameClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Reuses a random cached clip when one exists, otherwise downloads into the cache.
    ///
    /// Cached clips carry no record of a vision verdict, so with `vision` set the cache is
    /// skipped and a freshly checked clip is downloaded into it instead.
    pub async fn cached_or_download(&self, vision: bool, cancel: &CancelToken) -> Option<BackgroundAsset> {
        if vision {
            logi("Vision filter on, skipping unchecked cache");
        } else {
            let picked = cached_clips(&self.cache_dir).choose(&mut rand::thread_rng()).cloned();
            if let Some(path) = picked {
                logi(format!("Using cached background: {}", path.display()));
                return Some(BackgroundAsset { path, cached: true });
            }
        }

        let cache_dir = self.cache_dir.clone();
        let path = self
            .acquire(vision, cancel, |id| cache_dir.join(cache_file_name(id)))
            .await?;
        Some(BackgroundAsset { path, cached: true })
    }

    /// Fresh download to `out_path`, bypassing the cache.
    pub async fn download_unique(
        &self,
        out_path: &Path,
        vision: bool,
        cancel: &CancelToken,
    ) -> Option<BackgroundAsset> {
        let path = self.acquire(vision, cancel, |_| out_path.to_path_buf()).await?;
        Some(BackgroundAsset { path, cached: false })
    }

    /// Fills the cache with up to `count` new clips. Returns how many were saved.
    pub async fn prefetch(&self, count: usize, vision: bool, cancel: &CancelToken) -> usize {
        let mut saved = 0;
        for i in 0..count {
            if cancel.is_cancelled() {
                break;
            }
            logi(format!("Prefetching background {}/{}", i + 1, count));
            let cache_dir = self.cache_dir.clone();
            let target = move |id| cache_dir.join(cache_file_name(id));
            if self.acquire(vision, cancel, target).await.is_some() {
                saved += 1;
            }
        }
        logok(format!("Prefetched {} background clips into {}", saved, self.cache_dir.display()));
        saved
    }

    /// Same as [`prefetch`](Self::prefetch) but stops once `stop` resolves. The download in
    /// flight is abandoned and clips already saved still count.
    pub async fn prefetch_until<S>(&self, count: usize, vision: bool, stop: S) -> usize
    where
        S: Future,
    {
        let (handle, cancel) = cancel_pair();
        let prefetch = self.prefetch(count, vision, &cancel);
        tokio::pin!(prefetch);
        tokio::select! {
            saved = &mut prefetch => saved,
            _ = stop => {
                logw("Prefetch interrupted");
                handle.cancel();
                prefetch.await
            }
        }
    }

    /// The search, filter and download cycle, retried up to `max_attempts` times.
    async fn acquire<F>(&self, vision: bool, cancel: &CancelToken, target: F) -> Option<PathBuf>
    where
        F: Fn(u64) -> PathBuf + Send + Sync,
    {
        for attempt in 1..=self.settings.max_attempts {
            if cancel.is_cancelled() {
                logw("Background search cancelled");
                return None;
            }

            let keyword = *SEARCH_KEYWORDS.choose(&mut rand::thread_rng())?;
            logi(format!(
                "Background attempt {}/{}: searching '{}'",
                attempt, self.settings.max_attempts, keyword
            ));

            let mut videos = self.search(keyword, cancel).await?;
            if videos.is_empty() {
                logw(format!("No results for '{}', trying '{}'", keyword, FALLBACK_KEYWORD));
                videos = self.search(FALLBACK_KEYWORD, cancel).await?;
            }
            if videos.is_empty() {
                continue;
            }

            let candidates = safe_candidates(&mut videos, &mut rand::thread_rng());
            if candidates.is_empty() {
                logw(format!("All {} results for '{}' were filtered out", videos.len(), keyword));
                continue;
            }

            for candidate in candidates {
                if vision && !self.vision_check(&candidate, cancel).await {
                    continue;
                }
                let out_path = target(candidate.id);
                match cancel.run(self.pexels.download(&candidate.link, &out_path, None)).await {
                    Some(Ok(path)) => {
                        logok(format!("Background ready: {}", path.display()));
                        return Some(path);
                    }
                    Some(Err(err)) => {
                        logw(format!("Background download failed, trying next candidate: {:#}", err));
                        continue;
                    }
                    None => return None,
                }
            }
        }

        logw(format!("No background after {} attempts", self.settings.max_attempts));
        None
    }

    /// `None` only on cancellation; a failed search counts as an empty result.
    async fn search(&self, keyword: &str, cancel: &CancelToken) -> Option<Vec<PexelsVideo>> {
        let fut = self
            .pexels
            .search(keyword, &self.settings.orientation, self.settings.per_page);
        match cancel.run(fut).await? {
            Ok(videos) => Some(videos),
            Err(err) => {
                logw(format!("Pexels search failed for '{}': {:#}", keyword, err));
                Some(Vec::new())
            }
        }
    }

    async fn vision_check(&self, candidate: &Candidate, cancel: &CancelToken) -> bool {
        let probe = self.scratch_dir.join(format!("probe_{}.mp4", candidate.id));
        let frame = self.scratch_dir.join(format!("probe_{}.jpg", candidate.id));

        let verdict = async {
            self.pexels
                .download(&candidate.link, &probe, Some(PROBE_BYTES))
                .await
                .ok()?;
            self.ffmpeg
                .extract_frame(&probe, PROBE_TIMESTAMP, &frame, cancel)
                .await
                .ok()?;
            let jpeg = fs::read(&frame).await.ok()?;
            Some(accept_frame(self.classifier.as_ref(), &jpeg).await)
        };
        let accepted = cancel.run(verdict).await.flatten().unwrap_or(false);

        let _ = fs::remove_file(&probe).await;
        let _ = fs::remove_file(&frame).await;
        accepted
    }
}
