use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;

/// Measurements the scene builder needs to lay out text.
pub trait TextMetrics {
    /// Horizontal advance of `text` on a single line, in pixels.
    fn text_width(&self, text: &str, size: f32) -> f32;
    /// Distance between consecutive baselines, in pixels.
    fn line_height(&self, size: f32) -> f32;
}

/// A font that can also rasterize.
pub trait Typeface: TextMetrics {
    /// Draws one line of text with its top-left corner at `(x, y)`.
    fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>, text: &str);
}

const FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/usr/X11R6/lib/X11/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
];

/// TrueType/OpenType face loaded from disk.
pub struct TrueTypeFace {
    font: FontArc,
}

impl TrueTypeFace {
    /// Loads a font by path or by file name.
    ///
    /// Bare file names such as `DejaVuSans.ttf` are looked up under the usual
    /// system font directories and `~/.local/share/fonts`.
    pub fn load(name: &str) -> Result<Self> {
        let path = resolve_font(name)
            .with_context(|| format!("Font '{}' not found in any font directory", name))?;
        log::info!("Loading font from {}", path.display());

        let data = std::fs::read(&path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(data)
            .with_context(|| format!("Failed to parse font {}", path.display()))?;
        Ok(Self { font })
    }
}

impl TextMetrics for TrueTypeFace {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut previous = None;
        for ch in text.chars() {
            let glyph = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                width += scaled.kern(prev, glyph);
            }
            width += scaled.h_advance(glyph);
            previous = Some(glyph);
        }
        width
    }

    fn line_height(&self, size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(size));
        scaled.height() + scaled.line_gap()
    }
}

impl Typeface for TrueTypeFace {
    fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>, text: &str) {
        draw_text_mut(canvas, color, x, y, PxScale::from(size), &self.font, text);
    }
}

fn resolve_font(name: &str) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }

    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(Path::new(&home).join(".local/share/fonts"));
        dirs.push(Path::new(&home).join(".fonts"));
    }
    dirs.extend(FONT_DIRS.iter().map(PathBuf::from));

    dirs.iter().find_map(|dir| find_file(dir, name, 6))
}

fn find_file(dir: &Path, name: &str, depth: usize) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path.file_name().map_or(false, |f| f == name) {
            return Some(path);
        }
    }
    if depth == 0 {
        return None;
    }
    subdirs.sort();
    subdirs.iter().find_map(|d| find_file(d, name, depth - 1))
}
