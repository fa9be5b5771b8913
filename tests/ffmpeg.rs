//! Encoder tests against a real ffmpeg. Skipped when ffmpeg or ffprobe is not on PATH.

use quran_shorts::cancel::CancelToken;
use quran_shorts::config::Config;
use quran_shorts::ffmpeg::Ffmpeg;
use quran_shorts::models::VerseClip;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;

const FPS: u32 = 25;

fn ffmpeg_available() -> bool {
    which::which("ffmpeg").is_ok() && which::which("ffprobe").is_ok()
}

fn small_config() -> Config {
    let mut cfg = Config::default();
    cfg.video.width = 180;
    cfg.video.height = 320;
    cfg.video.fps = FPS;
    cfg
}

// One video frame plus one AAC packet of muxing slack.
fn frame_tolerance() -> f64 {
    1.0 / FPS as f64 + 1024.0 / 44_100.0
}

async fn lavfi(source: &str, extra: &[&str], out: &Path) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i", source])
        .args(extra)
        .arg(out)
        .status()
        .await
        .unwrap();
    assert!(status.success(), "lavfi source failed: {source}");
}

async fn background(dir: &Path, hex: &str) -> PathBuf {
    let out = dir.join(format!("bg_{hex}.mp4"));
    lavfi(&format!("color=c=0x{hex}:s=320x240:d=1:r={FPS}"), &["-c:v", "mpeg4"], &out).await;
    out
}

async fn tone(dir: &Path, name: &str, seconds: f64) -> PathBuf {
    let out = dir.join(format!("{name}.wav"));
    lavfi(&format!("sine=frequency=440:sample_rate=44100:duration={seconds}"), &[], &out).await;
    out
}

/// Index of the strongest channel at the frame center.
fn dominant_channel(frame: &Path) -> usize {
    let img = image::open(frame).unwrap().to_rgb8();
    let px = img.get_pixel(img.width() / 2, img.height() / 2).0;
    (0..3).max_by_key(|&i| px[i]).unwrap()
}

#[tokio::test]
async fn test_verse_clip_matches_audio_duration() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let ff = Ffmpeg::new(&small_config());
    let cancel = CancelToken::never();

    let bg = background(dir.path(), "0000FF").await;
    let audio = tone(dir.path(), "001001", 2.4).await;
    let out = dir.path().join("ayah_1.mp4");
    ff.make_verse_clip(&bg, &audio, None, &out, &cancel).await.unwrap();

    let audio_secs = ff.probe_duration_seconds(&audio).await.unwrap();
    let clip_secs = ff.probe_duration_seconds(&out).await.unwrap();
    assert!(
        (clip_secs - audio_secs).abs() <= frame_tolerance(),
        "clip {clip_secs:.3}s vs audio {audio_secs:.3}s"
    );
}

#[tokio::test]
async fn test_merged_clips_follow_verse_order() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let ff = Ffmpeg::new(&small_config());
    let cancel = CancelToken::never();

    // Red, green, blue backgrounds for verses 1, 2, 3.
    let colors = ["FF0000", "00FF00", "0000FF"];
    let mut clips = Vec::new();
    let mut expected_total = 0.0;
    for (i, hex) in colors.iter().enumerate() {
        let verse = i as u16 + 1;
        let bg = background(dir.path(), hex).await;
        let audio = tone(dir.path(), &format!("001{:03}", verse), 1.0).await;
        let out = dir.path().join(format!("ayah_{verse}.mp4"));
        ff.make_verse_clip(&bg, &audio, None, &out, &cancel).await.unwrap();
        expected_total += ff.probe_duration_seconds(&out).await.unwrap();
        clips.push(VerseClip { verse, path: out });
    }

    let merged = dir.path().join("final.mp4");
    ff.merge_clips(&clips, &merged, dir.path(), &cancel).await.unwrap();

    let total = ff.probe_duration_seconds(&merged).await.unwrap();
    assert!(
        (total - expected_total).abs() <= 3.0 * frame_tolerance(),
        "merged {total:.3}s vs clips {expected_total:.3}s"
    );

    for (i, at) in ["00:00:00.500", "00:00:01.500", "00:00:02.500"].iter().enumerate() {
        let png = dir.path().join(format!("frame_{i}.png"));
        ff.extract_frame(&merged, at, &png, &cancel).await.unwrap();
        assert_eq!(dominant_channel(&png), i, "segment {} out of order", i + 1);
    }
}

#[tokio::test]
async fn test_single_clip_merge_keeps_duration() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let ff = Ffmpeg::new(&small_config());
    let cancel = CancelToken::never();

    let bg = background(dir.path(), "00FF00").await;
    let audio = tone(dir.path(), "002255", 1.5).await;
    let clip = dir.path().join("ayah_255.mp4");
    ff.make_verse_clip(&bg, &audio, None, &clip, &cancel).await.unwrap();
    let before = ff.probe_duration_seconds(&clip).await.unwrap();

    let merged = dir.path().join("out").join("final.mp4");
    let clips = [VerseClip { verse: 255, path: clip.clone() }];
    ff.merge_clips(&clips, &merged, dir.path(), &cancel).await.unwrap();

    assert!(!clip.exists());
    let after = ff.probe_duration_seconds(&merged).await.unwrap();
    assert!((after - before).abs() < 1e-3);
}
