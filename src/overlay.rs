//! Centroid overlay: circles and index labels drawn over the source image
//! for visual checking of the detector.
//!
//! # Coordinate convention
//!
//! A centroid `(row, col)` is drawn centered at pixel-space `(x, y) = (col, row)`
//! in the image's own top-left-origin frame, rows increasing downward.
//! There is no vertical flip. Centroids outside the image are drawn as
//! given and simply clip.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;
use tracing::debug;

use crate::centroid::Centroid;
use crate::error::{BatchError, Result};
use crate::image_record::ImageRecord;

pub mod colors {
    use image::Rgb;

    pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
    pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
}

/// Configuration for overlay rendering.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Circle radius in pixels. Default: 5
    pub radius: f32,
    /// Circle outline color. Default: red
    pub circle_color: Rgb<u8>,
    /// Index label color. Default: yellow
    pub label_color: Rgb<u8>,
    /// Draw labels with a doubled stroke. Default: true
    pub bold_labels: bool,
    /// Number of concentric one-pixel rings forming the outline. Default: 1
    pub line_width: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            circle_color: colors::RED,
            label_color: colors::YELLOW,
            bold_labels: true,
            line_width: 1,
        }
    }
}

/// Geometry of one overlay marker, in image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayMarker {
    /// Horizontal center (the centroid's column).
    pub x: f32,
    /// Vertical center (the centroid's row).
    pub y: f32,
    pub radius: f32,
    /// Zero-based position in the centroid sequence.
    pub index: usize,
}

// ── Tier 1: geometry ──

/// Map centroids to marker geometry, preserving order.
pub fn compute_markers(centroids: &[Centroid], radius: f32) -> Vec<OverlayMarker> {
    centroids
        .iter()
        .enumerate()
        .map(|(index, c)| OverlayMarker {
            x: c.col,
            y: c.row,
            radius,
            index,
        })
        .collect()
}

// ── Tier 2: rasterization ──

/// Stateless renderer; the same image and centroids always give the same pixels.
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    pub config: OverlayConfig,
}

impl OverlayRenderer {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    /// Render the image as RGB with every centroid circled and numbered.
    pub fn render(&self, image: &ImageRecord, centroids: &[Centroid]) -> RgbImage {
        let mut canvas = image.image.to_rgb8();
        let markers = compute_markers(centroids, self.config.radius);

        for m in &markers {
            let center = (m.x.round() as i32, m.y.round() as i32);
            let radius = m.radius.round() as i32;
            for ring in 0..self.config.line_width.max(1) as i32 {
                draw_hollow_circle_mut(
                    &mut canvas,
                    center,
                    radius + ring,
                    self.config.circle_color,
                );
            }
        }
        // Labels go on top of every circle.
        for m in &markers {
            draw_label(
                &mut canvas,
                m.x.round() as i32,
                m.y.round() as i32,
                &m.index.to_string(),
                self.config.label_color,
                self.config.bold_labels,
            );
        }
        canvas
    }
}

const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: i32 = 5;

/// 3×5 digit glyphs, one byte per row, bit 2 is the left column.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Draw `text` (digits only) with its baseline at `y` and its left edge at `x`,
/// so it reads upward from the anchor like a plot annotation.
fn draw_label(canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, bold: bool) {
    let advance = GLYPH_WIDTH + if bold { 2 } else { 1 };
    let top = y - (GLYPH_HEIGHT - 1);
    for (i, digit) in text.chars().filter_map(|c| c.to_digit(10)).enumerate() {
        let left = x + i as i32 * advance;
        for (row, bits) in DIGITS[digit as usize].iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let (px, py) = (left + col, top + row as i32);
                put_pixel_checked(canvas, px, py, color);
                if bold {
                    put_pixel_checked(canvas, px + 1, py, color);
                }
            }
        }
    }
}

/// Bounds-checked single pixel write.
fn put_pixel_checked(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

// ── Tier 3: presentation ──

/// Where rendered overlays go once per image.
pub trait OverlaySink {
    fn present(&mut self, image: &ImageRecord, overlay: &RgbImage) -> Result<()>;
}

/// Writes `<stem>_centroids.png` into a directory.
#[derive(Debug, Clone)]
pub struct OverlayDir {
    dir: PathBuf,
}

impl OverlayDir {
    /// Use `dir` for overlays, creating it if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| BatchError::Overlay {
            path: dir.clone(),
            source: image::ImageError::IoError(e),
        })?;
        Ok(Self { dir })
    }

    /// Output path for an input image.
    pub fn overlay_path(&self, image_path: &Path) -> PathBuf {
        let stem = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        self.dir.join(format!("{stem}_centroids.png"))
    }
}

impl OverlaySink for OverlayDir {
    fn present(&mut self, image: &ImageRecord, overlay: &RgbImage) -> Result<()> {
        let path = self.overlay_path(&image.path);
        overlay.save(&path).map_err(|source| BatchError::Overlay {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote overlay {}", path.display());
        Ok(())
    }
}

/// Drops overlays.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardOverlays;

impl OverlaySink for DiscardOverlays {
    fn present(&mut self, _image: &ImageRecord, _overlay: &RgbImage) -> Result<()> {
        Ok(())
    }
}
