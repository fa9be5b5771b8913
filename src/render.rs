//! Verse text overlay: cleanup, Arabic reshaping, bidi reordering, outlined rasterization.

use crate::config::{Config, TextAnchor, TextSettings};
use crate::models::Verse;
use crate::{logi, logw};
use anyhow::{Context, Result, anyhow};
use fontdue::layout::{CoordinateSystem, GlyphPosition, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::{Path, PathBuf};
use unicode_bidi::BidiInfo;
use walkdir::WalkDir;

const GENERIC_FONT_DIRS: &[&str] = &["/usr/share/fonts", "/Library/Fonts", "C:\\Windows\\Fonts"];
const LOWER_THIRD: f32 = 0.70;

fn bracketed_regex() -> Result<&'static Regex> {
    static BRACKETED_RE: OnceCell<Regex> = OnceCell::new();
    BRACKETED_RE.get_or_try_init(|| Regex::new(r"\[.*?\]|\{.*?\}").context("failed to compile bracket regex"))
}

fn whitespace_regex() -> Result<&'static Regex> {
    static WHITESPACE_RE: OnceCell<Regex> = OnceCell::new();
    WHITESPACE_RE.get_or_try_init(|| Regex::new(r"\s+").context("failed to compile whitespace regex"))
}

/// Drops `[..]` and `{..}` placeholders and collapses runs of whitespace.
pub fn clean_text(text: &str) -> Result<String> {
    let stripped = bracketed_regex()?.replace_all(text, "");
    Ok(whitespace_regex()?.replace_all(stripped.trim(), " ").into_owned())
}

pub fn verse_label(verse: &Verse) -> Result<String> {
    Ok(format!("\u{FD3F} {} \u{FD3E} ({})", clean_text(&verse.text)?, verse.number))
}

/// Labels for a verse range, separated by blank lines.
pub fn join_verses(verses: &[Verse]) -> Result<String> {
    Ok(verses.iter().map(verse_label).collect::<Result<Vec<_>>>()?.join("\n\n"))
}

fn mirror(c: char) -> char {
    match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '<' => '>',
        '>' => '<',
        '«' => '»',
        '»' => '«',
        other => other,
    }
}

/// Contextual letterforms, then visual (left-to-right) order for a rasterizer without RTL support.
pub fn shape_line(line: &str) -> String {
    let reshaped = ar_reshaper::reshape_line(line);
    let bidi = BidiInfo::new(&reshaped, None);
    let mut visual = String::with_capacity(reshaped.len());

    for para in &bidi.paragraphs {
        let (levels, runs) = bidi.visual_runs(para, para.range.clone());
        for run in runs {
            let text = &reshaped[run.clone()];
            if levels[run.start].is_rtl() {
                visual.extend(text.chars().rev().map(mirror));
            } else {
                visual.push_str(text);
            }
        }
    }
    visual
}

fn load_font(path: &Path) -> Result<Font> {
    let bytes = std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
    Font::from_bytes(bytes, FontSettings::default()).map_err(|e| anyhow!("parse font {}: {}", path.display(), e))
}

/// First loadable font from `paths`, else any TrueType font found in the system font directories.
pub fn find_font(paths: &[PathBuf]) -> Result<(PathBuf, Font)> {
    for path in paths.iter().filter(|p| p.exists()) {
        match load_font(path) {
            Ok(font) => {
                logi(format!("Using font: {}", path.display()));
                return Ok((path.clone(), font));
            }
            Err(err) => logw(format!("{:#}", err)),
        }
    }

    let generic = GENERIC_FONT_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("ttf")));
    for path in generic {
        if let Ok(font) = load_font(&path) {
            logw(format!(
                "No Arabic font found, using {} (diacritics may not render)",
                path.display()
            ));
            return Ok((path, font));
        }
    }

    Err(anyhow!("no usable font found"))
}

pub struct TextRenderer {
    font: Font,
    settings: TextSettings,
    width: u32,
    height: u32,
}

impl TextRenderer {
    pub fn new(cfg: &Config) -> Result<Self> {
        let (_, font) = find_font(&cfg.text.font_paths)?;
        Ok(Self::with_font(font, cfg))
    }

    pub fn with_font(font: Font, cfg: &Config) -> Self {
        Self {
            font,
            settings: cfg.text.clone(),
            width: cfg.video.width,
            height: cfg.video.height,
        }
    }

    fn layout(&self, text: &str) -> Vec<GlyphPosition> {
        let mut layout: Layout<()> = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: 0.0,
            y: 0.0,
            ..LayoutSettings::default()
        });
        layout.append(&[&self.font], &TextStyle::new(text, self.settings.font_size, 0));
        layout.glyphs().to_vec()
    }

    fn text_width(&self, text: &str) -> f32 {
        self.layout(text)
            .iter()
            .map(|g| g.x + g.width as f32)
            .fold(0.0, f32::max)
    }

    fn line_height(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.settings.font_size)
            .map(|m| m.new_line_size)
            .unwrap_or(self.settings.font_size * 1.4)
    }

    /// Greedy word wrap in logical order, measured on the reshaped text.
    pub fn wrap(&self, text: &str) -> Vec<String> {
        let max_width = self.width.saturating_sub(2 * self.settings.padding) as f32;
        let mut lines = Vec::new();

        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{} {}", current, word)
                };
                if !current.is_empty() && self.text_width(&ar_reshaper::reshape_line(&candidate)) > max_width {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                } else {
                    current = candidate;
                }
            }
            lines.push(current);
        }
        lines
    }

    /// Transparent frame-sized image with white text over a black outline.
    pub fn render(&self, text: &str) -> RgbaImage {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut mask = vec![0u8; w * h];

        let lines: Vec<String> = self.wrap(text).iter().map(|l| shape_line(l)).collect();
        let line_height = self.line_height();
        let spacing = self.settings.line_spacing as f32;
        let block = lines.len() as f32 * line_height + lines.len().saturating_sub(1) as f32 * spacing;

        let top = match self.settings.anchor {
            TextAnchor::Center => (h as f32 - block) / 2.0,
            TextAnchor::LowerThird => {
                let limit = h as f32 - self.settings.padding as f32 - block;
                (h as f32 * LOWER_THIRD).min(limit)
            }
        }
        .max(0.0);

        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let glyphs = self.layout(line);
            let line_width = glyphs.iter().map(|g| g.x + g.width as f32).fold(0.0, f32::max);
            let x0 = ((w as f32 - line_width) / 2.0).max(0.0);
            let y0 = top + i as f32 * (line_height + spacing);

            for glyph in glyphs.iter().filter(|g| g.width > 0 && g.height > 0) {
                let (_, bitmap) = self.font.rasterize_config(glyph.key);
                let gx = (x0 + glyph.x).round() as i64;
                let gy = (y0 + glyph.y).round() as i64;
                for row in 0..glyph.height {
                    for col in 0..glyph.width {
                        let (px, py) = (gx + col as i64, gy + row as i64);
                        if px < 0 || py < 0 || px >= w as i64 || py >= h as i64 {
                            continue;
                        }
                        let idx = py as usize * w + px as usize;
                        mask[idx] = mask[idx].max(bitmap[row * glyph.width + col]);
                    }
                }
            }
        }

        let outline = dilate(&mask, w, h, self.settings.outline_width.max(0) as usize);
        let mut img = RgbaImage::new(self.width, self.height);
        for (idx, pixel) in img.pixels_mut().enumerate() {
            blend(pixel, [0, 0, 0], outline[idx]);
            blend(pixel, [255, 255, 255], mask[idx]);
        }
        img
    }

    pub fn render_to_png(&self, text: &str, out_png: &Path) -> Result<PathBuf> {
        if let Some(parent) = out_png.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        self.render(text)
            .save(out_png)
            .with_context(|| format!("write overlay {}", out_png.display()))?;
        Ok(out_png.to_path_buf())
    }
}

/// Square max filter of `radius`, the same footprint as drawing the text at every offset in
/// `-radius..=radius` on both axes.
fn dilate(mask: &[u8], w: usize, h: usize, radius: usize) -> Vec<u8> {
    if radius == 0 {
        return mask.to_vec();
    }
    let mut horizontal = vec![0u8; w * h];
    for y in 0..h {
        let row = &mask[y * w..(y + 1) * w];
        for x in 0..w {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(w - 1);
            horizontal[y * w + x] = row[lo..=hi].iter().copied().max().unwrap_or(0);
        }
    }
    let mut out = vec![0u8; w * h];
    for x in 0..w {
        for y in 0..h {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(h - 1);
            out[y * w + x] = (lo..=hi).map(|yy| horizontal[yy * w + x]).max().unwrap_or(0);
        }
    }
    out
}

fn blend(dst: &mut Rgba<u8>, color: [u8; 3], coverage: u8) {
    if coverage == 0 {
        return;
    }
    let sa = coverage as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let mixed = (color[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = mixed.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verse(number: u16, text: &str) -> Verse {
        Verse {
            surah: 1,
            number,
            text: text.to_string(),
            surah_name: "الفاتحة".to_string(),
        }
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("  بِسْمِ [1]  ٱللَّهِ {note}\n ٱلرَّحْمَـٰنِ ").unwrap(),
            "بِسْمِ ٱللَّهِ ٱلرَّحْمَـٰنِ"
        );
        assert_eq!(clean_text("[only]").unwrap(), "");
    }

    #[test]
    fn test_labels_and_join() {
        let verses = vec![verse(1, "أ"), verse(2, "ب [x]")];
        assert_eq!(verse_label(&verses[0]).unwrap(), "\u{FD3F} أ \u{FD3E} (1)");
        assert_eq!(join_verses(&verses).unwrap(), "\u{FD3F} أ \u{FD3E} (1)\n\n\u{FD3F} ب \u{FD3E} (2)");
    }

    #[test]
    fn test_shape_line_reverses_arabic() {
        let text = "بسم الله";
        let reshaped = ar_reshaper::reshape_line(text);
        let expected: String = reshaped.chars().rev().collect();
        assert_eq!(shape_line(text), expected);
        assert_ne!(reshaped, text);
    }

    #[test]
    fn test_shape_line_keeps_latin_and_mirrors_brackets() {
        assert_eq!(shape_line("hello world"), "hello world");
        let shaped = shape_line("بسم (ا)");
        assert!(shaped.starts_with('('));
        assert!(!shaped.contains(")("));
    }

    #[test]
    fn test_dilate_square_footprint() {
        let mut mask = vec![0u8; 25];
        mask[12] = 200;
        let out = dilate(&mask, 5, 5, 1);
        let lit: Vec<usize> = (0..25).filter(|&i| out[i] == 200).collect();
        assert_eq!(lit, vec![6, 7, 8, 11, 12, 13, 16, 17, 18]);
        assert_eq!(dilate(&mask, 5, 5, 0), mask);
    }

    #[test]
    fn test_blend_over_transparent() {
        let mut px = Rgba([0, 0, 0, 0]);
        blend(&mut px, [255, 255, 255], 255);
        assert_eq!(px, Rgba([255, 255, 255, 255]));

        let mut px = Rgba([0, 0, 0, 255]);
        blend(&mut px, [255, 255, 255], 0);
        assert_eq!(px, Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_render_when_font_available() {
        let cfg = Config::default();
        let Ok((_, font)) = find_font(&cfg.text.font_paths) else {
            return;
        };
        let renderer = TextRenderer::with_font(font, &cfg);
        let img = renderer.render(&verse_label(&verse(1, "بِسْمِ ٱللَّهِ")).unwrap());
        assert_eq!(img.dimensions(), (1080, 1920));
        assert!(img.pixels().any(|p| p[3] > 0));
        assert!(img.pixels().any(|p| p[3] == 0));

        let dir = tempfile::TempDir::new().unwrap();
        let out = renderer.render_to_png("abc", &dir.path().join("o.png")).unwrap();
        assert!(out.exists());
    }
}
