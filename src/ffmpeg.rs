use crate::cancel::CancelToken;
use crate::config::{Config, Timeouts, VideoSettings};
use crate::error::{MediaError, MediaResult};
use crate::models::VerseClip;
use crate::{logi, logok, logw};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;

const STDERR_TAIL: usize = 2000;

async fn run_cmd(args: &[String], timeout_secs: u64, cancel: &CancelToken) -> MediaResult<Vec<u8>> {
    let Some((program, rest)) = args.split_first() else {
        return Ok(Vec::new());
    };

    which::which(program).map_err(|_| match program.as_str() {
        "ffprobe" => MediaError::FfprobeNotFound,
        _ => MediaError::FfmpegNotFound,
    })?;

    let child = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    // Dropping the wait future on timeout or cancel kills the child.
    let wait = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output());
    let output = match cancel.run(wait).await {
        None => {
            logw(format!("{} cancelled, process killed", program));
            return Err(MediaError::Cancelled);
        }
        Some(Err(_)) => {
            logw(format!("{} timed out after {} seconds, process killed", program, timeout_secs));
            return Err(MediaError::Timeout(timeout_secs));
        }
        Some(Ok(result)) => result?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let skip = stderr.chars().count().saturating_sub(STDERR_TAIL);
        let tail: String = stderr.chars().skip(skip).collect();
        logw(format!("{} failed ({:?}): {}", program, output.status.code(), tail.trim()));
        return Err(MediaError::ffmpeg_failed(
            format!("{} exited with non-zero status", program),
            Some(tail),
            output.status.code(),
        ));
    }

    Ok(output.stdout)
}

fn base_args() -> Vec<String> {
    ["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// `scale to cover, then crop` into the target frame, optionally overlaying a centered image.
pub fn cover_crop_filter(width: u32, height: u32, with_overlay: bool) -> String {
    let cover = format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}",
        w = width,
        h = height
    );
    if with_overlay {
        format!("{cover}[bg];[bg][2:v]overlay=(W-w)/2:(H-h)/2[outv]")
    } else {
        format!("{cover}[outv]")
    }
}

/// Concat demuxer entry. Paths are absolute with forward slashes; single quotes are escaped.
pub fn manifest_line(path: &Path) -> String {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let normalized = abs.display().to_string().replace('\\', "/");
    format!("file '{}'\n", normalized.replace('\'', "'\\''"))
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    video: VideoSettings,
    timeouts: Timeouts,
}

impl Ffmpeg {
    pub fn new(cfg: &Config) -> Self {
        Self {
            video: cfg.video.clone(),
            timeouts: cfg.timeouts.clone(),
        }
    }

    pub async fn version(&self) -> MediaResult<String> {
        let args = vec!["ffmpeg".to_string(), "-version".to_string()];
        let out = run_cmd(&args, self.timeouts.version_check, &CancelToken::never()).await?;
        let text = String::from_utf8_lossy(&out);
        Ok(text.lines().next().unwrap_or_default().to_string())
    }

    pub async fn probe_duration_seconds(&self, path: &Path) -> MediaResult<f64> {
        let args = vec![
            "ffprobe".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.display().to_string(),
        ];
        let out = run_cmd(&args, self.timeouts.frame, &CancelToken::never()).await?;
        let text = String::from_utf8_lossy(&out).trim().to_string();
        let duration = text.parse::<f64>().unwrap_or(-1.0);
        if duration <= 0.1 {
            return Err(MediaError::InvalidDuration);
        }
        Ok(duration)
    }

    pub async fn extract_frame(
        &self,
        video: &Path,
        at: &str,
        out_jpg: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf> {
        let mut args = base_args();
        args.extend([
            "-ss".to_string(),
            at.to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-vframes".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            out_jpg.display().to_string(),
        ]);
        run_cmd(&args, self.timeouts.frame, cancel).await?;
        Ok(out_jpg.to_path_buf())
    }

    pub fn verse_clip_args(&self, background: &Path, audio: &Path, overlay: Option<&Path>, out_mp4: &Path) -> Vec<String> {
        let mut args = base_args();
        args.extend([
            "-stream_loop".to_string(),
            "-1".to_string(),
            "-i".to_string(),
            background.display().to_string(),
            "-i".to_string(),
            audio.display().to_string(),
        ]);
        if let Some(image) = overlay {
            args.push("-i".to_string());
            args.push(image.display().to_string());
        }
        args.extend([
            "-filter_complex".to_string(),
            cover_crop_filter(self.video.width, self.video.height, overlay.is_some()),
            "-map".to_string(),
            "[outv]".to_string(),
            "-map".to_string(),
            "1:a".to_string(),
            "-c:v".to_string(),
            self.video.video_codec.clone(),
            "-q:v".to_string(),
            self.video.video_quality.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            self.video.audio_bitrate.clone(),
            "-r".to_string(),
            self.video.fps.to_string(),
            "-shortest".to_string(),
            out_mp4.display().to_string(),
        ]);
        args
    }

    pub async fn make_verse_clip(
        &self,
        background: &Path,
        audio: &Path,
        overlay: Option<&Path>,
        out_mp4: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf> {
        let args = self.verse_clip_args(background, audio, overlay, out_mp4);
        run_cmd(&args, self.timeouts.clip, cancel).await?;
        if !out_mp4.exists() {
            return Err(MediaError::ffmpeg_failed("clip output missing", None, None));
        }
        logok(format!("Video created: {}", out_mp4.display()));
        Ok(out_mp4.to_path_buf())
    }

    pub async fn concat_clips(&self, manifest: &Path, out_mp4: &Path, cancel: &CancelToken) -> MediaResult<PathBuf> {
        let mut args = base_args();
        args.extend([
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            manifest.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            out_mp4.display().to_string(),
        ]);
        run_cmd(&args, self.timeouts.concat, cancel).await?;
        if !out_mp4.exists() {
            return Err(MediaError::ffmpeg_failed("concat output missing", None, None));
        }
        Ok(out_mp4.to_path_buf())
    }

    /// One clip is moved into place; several are stream-copied through a concat manifest.
    pub async fn merge_clips(
        &self,
        clips: &[VerseClip],
        out_mp4: &Path,
        work_dir: &Path,
        cancel: &CancelToken,
    ) -> MediaResult<PathBuf> {
        if let Some(parent) = out_mp4.parent() {
            fs::create_dir_all(parent).await?;
        }

        match clips {
            [] => Err(MediaError::ffmpeg_failed("no clips to merge", None, None)),
            [only] => {
                move_file(&only.path, out_mp4).await?;
                logok(format!("Single video moved to: {}", out_mp4.display()));
                Ok(out_mp4.to_path_buf())
            }
            many => {
                let manifest = work_dir.join("concat_list.txt");
                let body: String = many.iter().map(|c| manifest_line(&c.path)).collect();
                fs::write(&manifest, body).await?;
                logi(format!("Merging {} videos into {}", many.len(), out_mp4.display()));
                self.concat_clips(&manifest, out_mp4, cancel).await
            }
        }
    }
}

/// Rename, falling back to copy + remove across filesystems.
pub async fn move_file(src: &Path, dst: &Path) -> MediaResult<()> {
    if fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }
    fs::copy(src, dst).await?;
    fs::remove_file(src).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cover_crop_filter() {
        assert_eq!(
            cover_crop_filter(1080, 1920, false),
            "[0:v]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920[outv]"
        );
        let with_text = cover_crop_filter(1080, 1920, true);
        assert!(with_text.ends_with("[bg];[bg][2:v]overlay=(W-w)/2:(H-h)/2[outv]"));
    }

    #[test]
    fn test_verse_clip_args() {
        let ff = Ffmpeg::new(&Config::default());
        let args = ff.verse_clip_args(
            Path::new("bg.mp4"),
            Path::new("001001.mp3"),
            Some(Path::new("verse.png")),
            Path::new("ayah_1.mp4"),
        );
        let pos = |needle: &str| args.iter().position(|a| a == needle).unwrap();

        assert_eq!(args[0], "ffmpeg");
        assert_eq!(args[pos("-stream_loop") + 1], "-1");
        assert!(pos("-stream_loop") < pos("bg.mp4"));
        assert_eq!(args[pos("-b:a") + 1], "192k");
        assert_eq!(args[pos("-r") + 1], "30");
        assert_eq!(args[pos("-c:v") + 1], "mpeg4");
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"verse.png".to_string()));
        assert_eq!(args.last().unwrap(), "ayah_1.mp4");
    }

    #[test]
    fn test_verse_clip_args_without_overlay() {
        let ff = Ffmpeg::new(&Config::default());
        let args = ff.verse_clip_args(Path::new("bg.mp4"), Path::new("a.mp3"), None, Path::new("o.mp4"));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert!(args.iter().any(|a| a.ends_with("crop=1080:1920[outv]")));
    }

    #[test]
    fn test_manifest_line_is_absolute_and_escaped() {
        let line = manifest_line(Path::new("clips/it's.mp4"));
        assert!(line.ends_with("/clips/it'\\''s.mp4'\n"));
        #[cfg(unix)]
        assert!(line.starts_with("file '/"));
    }

    #[tokio::test]
    async fn test_merge_single_clip_is_moved() {
        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("ayah_1.mp4");
        fs::write(&clip, b"clip").await.unwrap();
        let out = dir.path().join("out").join("final.mp4");

        let ff = Ffmpeg::new(&Config::default());
        let clips = vec![VerseClip { verse: 1, path: clip.clone() }];
        let merged = ff
            .merge_clips(&clips, &out, dir.path(), &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(merged, out);
        assert!(!clip.exists());
        assert_eq!(fs::read(&out).await.unwrap(), b"clip");
        assert!(!dir.path().join("concat_list.txt").exists());
    }

    #[tokio::test]
    async fn test_merge_empty_fails() {
        let dir = TempDir::new().unwrap();
        let ff = Ffmpeg::new(&Config::default());
        let res = ff
            .merge_clips(&[], &dir.path().join("x.mp4"), dir.path(), &CancelToken::never())
            .await;
        assert!(res.is_err());
    }
}
