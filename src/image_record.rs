//! A decoded input image plus the name it is reported under.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};

use crate::error::{BatchError, Result};

/// One loaded image, owned by a single iteration of the batch loop.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Path the image was loaded from.
    pub path: PathBuf,
    /// Name used in the report header (the final path component).
    pub name: String,
    /// Decoded pixels, origin top-left, row-major.
    pub image: DynamicImage,
}

impl ImageRecord {
    /// Load and decode an image file.
    ///
    /// Any format the `image` crate can decode is accepted; nothing else
    /// is validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|source| BatchError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_image(path, image))
    }

    /// Wrap an already-decoded image.
    pub fn from_image(path: impl AsRef<Path>, image: DynamicImage) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = display_name(&path);
        Self { path, name, image }
    }

    pub fn width(&self) -> u32 {
        self.image.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.image.dimensions().1
    }

    /// Row-major grayscale intensities.
    ///
    /// 16-bit and float images keep their native range; 8-bit and
    /// everything else goes through `to_luma8`.
    pub fn gray_pixels(&self) -> Vec<f32> {
        match &self.image {
            DynamicImage::ImageLuma16(g) => g.as_raw().iter().map(|&v| v as f32).collect(),
            DynamicImage::ImageLumaA16(g) => g.pixels().map(|p| p.0[0] as f32).collect(),
            DynamicImage::ImageRgb16(rgb) => rgb
                .pixels()
                .map(|p| luminance(p.0[0] as f32, p.0[1] as f32, p.0[2] as f32))
                .collect(),
            DynamicImage::ImageRgba16(rgba) => rgba
                .pixels()
                .map(|p| luminance(p.0[0] as f32, p.0[1] as f32, p.0[2] as f32))
                .collect(),
            DynamicImage::ImageRgb32F(rgb) => {
                rgb.pixels().map(|p| luminance(p.0[0], p.0[1], p.0[2])).collect()
            }
            DynamicImage::ImageRgba32F(rgba) => {
                rgba.pixels().map(|p| luminance(p.0[0], p.0[1], p.0[2])).collect()
            }
            _ => self
                .image
                .to_luma8()
                .as_raw()
                .iter()
                .map(|&v| v as f32)
                .collect(),
        }
    }
}

/// Rec. 709 luma weights.
fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Final path component, falling back to the whole path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
