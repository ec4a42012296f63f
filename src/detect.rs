//! Detect star centroids in an image.
//!
//! The reference detector works in five passes:
//! 1. Optional local background model (block medians, bilinear interpolation) is subtracted
//! 2. Global background level and noise are estimated (median + sigma-clipped lower half)
//! 3. Pixels above `background + sigma_threshold * noise` are labeled into blobs
//! 4. Each blob yields an intensity-weighted centroid and covariance
//! 5. Centroids are sorted brightest first and optionally truncated
//!
//! Centroids come back in array order, `(row, col)` with the origin at the
//! top-left pixel. This is the convention the overlay renderer draws in.
//!
//! # Example
//!
//! ```no_run
//! use tetra3_batch::{detect_centroids, DetectConfig, ImageRecord};
//!
//! let image = ImageRecord::load("my_star_image.png").unwrap();
//! let centroids = detect_centroids(&image, &DetectConfig::default()).unwrap();
//! println!("Found {} stars", centroids.len());
//! ```

use nalgebra::SymmetricEigen;
use tracing::debug;

use crate::centroid::Centroid;
use crate::error::{BatchError, Result};
use crate::image_record::ImageRecord;
use crate::Matrix2;

/// Anything that turns an image into an ordered list of centroids.
///
/// The batch driver never re-sorts what a detector returns.
pub trait CentroidDetector {
    fn detect(&self, image: &ImageRecord) -> Result<Vec<Centroid>>;
}

/// Configuration for the reference threshold detector.
#[derive(Debug, Clone)]
pub struct DetectConfig {
    /// Number of sigma above background used as the detection threshold.
    /// Default: 5.0
    pub sigma_threshold: f32,

    /// Minimum number of pixels in a blob to be considered a star.
    /// Filters hot pixels and noise.
    /// Default: 3
    pub min_pixels: usize,

    /// Maximum number of pixels in a blob to be considered a star.
    /// Default: 10000
    pub max_pixels: usize,

    /// Maximum number of centroids to return, brightest first.
    /// `None` returns all of them.
    /// Default: None
    pub max_centroids: Option<usize>,

    /// Iterations of sigma clipping for the noise estimate.
    /// Default: 5
    pub sigma_clip_iterations: usize,

    /// Pixels more than this many sigma from the mean are clipped.
    /// Default: 3.0
    pub sigma_clip_factor: f32,

    /// 8-connectivity (true) or 4-connectivity (false) for blob labeling.
    /// Default: true
    pub use_8_connectivity: bool,

    /// Block size (in pixels) for the local background model.
    ///
    /// The image is tiled into `n×n` blocks, the median of each block is
    /// taken, and the surface interpolated between block centers is
    /// subtracted before thresholding. Removes vignetting and nebulosity
    /// gradients. `None` uses only the global background.
    ///
    /// Default: Some(64)
    pub local_bg_block_size: Option<u32>,

    /// Maximum major/minor axis ratio of a blob. More elongated blobs
    /// (satellite trails, cosmic rays) are rejected. `None` disables.
    ///
    /// Default: Some(3.0)
    pub max_elongation: Option<f32>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            sigma_threshold: 5.0,
            min_pixels: 3,
            max_pixels: 10000,
            max_centroids: None,
            sigma_clip_iterations: 5,
            sigma_clip_factor: 3.0,
            use_8_connectivity: true,
            local_bg_block_size: Some(64),
            max_elongation: Some(3.0),
        }
    }
}

/// The reference [`CentroidDetector`].
#[derive(Debug, Clone, Default)]
pub struct ThresholdDetector {
    pub config: DetectConfig,
}

impl ThresholdDetector {
    pub fn new(config: DetectConfig) -> Self {
        Self { config }
    }
}

impl CentroidDetector for ThresholdDetector {
    fn detect(&self, image: &ImageRecord) -> Result<Vec<Centroid>> {
        detect_centroids(image, &self.config)
    }
}

/// Detect centroids in a loaded image.
pub fn detect_centroids(image: &ImageRecord, config: &DetectConfig) -> Result<Vec<Centroid>> {
    let gray = image.gray_pixels();
    detect_from_gray(&gray, image.width(), image.height(), config)
}

/// Detect centroids in a raw row-major grayscale buffer.
///
/// Useful for pixel data that does not come from an image file
/// (camera SDKs, FITS readers).
pub fn detect_centroids_from_raw(
    pixels: &[f32],
    width: u32,
    height: u32,
    config: &DetectConfig,
) -> Result<Vec<Centroid>> {
    let expected = width as usize * height as usize;
    if pixels.len() != expected {
        return Err(BatchError::Detect(format!(
            "pixel data length ({}) does not match width*height ({}x{}={})",
            pixels.len(),
            width,
            height,
            expected
        )));
    }
    detect_from_gray(pixels, width, height, config)
}

// ─── Internal helpers ───

fn detect_from_gray(
    input: &[f32],
    width: u32,
    height: u32,
    config: &DetectConfig,
) -> Result<Vec<Centroid>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    // Residuals keep their sign for the noise estimate; the detection image is clamped at zero.
    let local = config.local_bg_block_size.filter(|&b| b > 0);
    let (residual, signal) = match local {
        Some(block) => {
            let bg = local_background(input, width, height, block);
            let residual: Vec<f32> = input.iter().zip(&bg).map(|(&v, &b)| v - b).collect();
            let signal: Vec<f32> = residual.iter().map(|&v| v.max(0.0)).collect();
            (residual, signal)
        }
        None => (input.to_vec(), input.to_vec()),
    };

    let (bg_level, noise) = background_and_noise(&residual, config);
    let threshold = bg_level + config.sigma_threshold * noise;

    let mask: Vec<bool> = signal.iter().map(|&v| v > threshold).collect();
    let (labels, num_labels) = label_blobs(&mask, width, height, config.use_8_connectivity);

    // Locally subtracted images are already centered on zero.
    let weight_bg = if local.is_some() { 0.0 } else { bg_level };
    let mut centroids = blob_centroids(&signal, &labels, num_labels, width, weight_bg, config);

    debug!(
        "background {:.2} noise {:.2} threshold {:.2}: {} blobs, {} centroids",
        bg_level,
        noise,
        threshold,
        num_labels,
        centroids.len()
    );

    centroids.sort_by(|a, b| {
        b.mass
            .unwrap_or(0.0)
            .partial_cmp(&a.mass.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if let Some(max) = config.max_centroids {
        centroids.truncate(max);
    }
    Ok(centroids)
}

fn median_of_sorted(values: &[f32]) -> f32 {
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

/// Smooth background surface from block medians.
fn local_background(pixels: &[f32], width: u32, height: u32, block_size: u32) -> Vec<f32> {
    let w = width as usize;
    let h = height as usize;
    let bs = block_size as usize;
    let nx = w.div_ceil(bs);
    let ny = h.div_ceil(bs);

    let mut medians = vec![0.0f32; nx * ny];
    let mut vals: Vec<f32> = Vec::with_capacity(bs * bs);
    for by in 0..ny {
        for bx in 0..nx {
            vals.clear();
            for y in (by * bs)..((by + 1) * bs).min(h) {
                let row = &pixels[y * w..(y + 1) * w];
                vals.extend(
                    row[(bx * bs)..((bx + 1) * bs).min(w)]
                        .iter()
                        .copied()
                        .filter(|v| v.is_finite()),
                );
            }
            if !vals.is_empty() {
                vals.sort_unstable_by(|a, b| a.total_cmp(b));
                medians[by * nx + bx] = median_of_sorted(&vals);
            }
        }
    }

    let half = bs as f32 / 2.0;
    let mut background = Vec::with_capacity(w * h);
    for y in 0..h {
        let fy_abs = (y as f32 - half) / bs as f32;
        let by0 = (fy_abs.floor().max(0.0) as usize).min(ny - 1);
        let by1 = (by0 + 1).min(ny - 1);
        let fy = (fy_abs - by0 as f32).clamp(0.0, 1.0);
        for x in 0..w {
            let fx_abs = (x as f32 - half) / bs as f32;
            let bx0 = (fx_abs.floor().max(0.0) as usize).min(nx - 1);
            let bx1 = (bx0 + 1).min(nx - 1);
            let fx = (fx_abs - bx0 as f32).clamp(0.0, 1.0);

            let top = lerp(medians[by0 * nx + bx0], medians[by0 * nx + bx1], fx);
            let bottom = lerp(medians[by1 * nx + bx0], medians[by1 * nx + bx1], fx);
            background.push(lerp(top, bottom, fy));
        }
    }
    background
}

/// Exact at both ends and for equal endpoints.
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Background level (median) and noise (sigma-clipped RMS of the pixels at
/// or below the median, which stars cannot contaminate).
fn background_and_noise(pixels: &[f32], config: &DetectConfig) -> (f32, f32) {
    let mut values: Vec<f32> = pixels.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let median = median_of_sorted(&values);

    let mut low: Vec<f32> = values.into_iter().take_while(|&v| v <= median).collect();
    let mut sigma = 0.0f32;
    for _ in 0..config.sigma_clip_iterations {
        if low.is_empty() {
            break;
        }
        let n = low.len() as f64;
        let mean = low.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = low.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        sigma = var.sqrt() as f32;
        if sigma < 1e-10 {
            break;
        }
        let lo = mean as f32 - config.sigma_clip_factor * sigma;
        let hi = mean as f32 + config.sigma_clip_factor * sigma;
        let before = low.len();
        low.retain(|&v| v >= lo && v <= hi);
        if low.len() == before {
            break;
        }
    }
    (median, sigma)
}

/// Two-pass union-find labeling. Returns per-pixel labels (0 = background,
/// blobs numbered from 1) and the number of blobs.
fn label_blobs(mask: &[bool], width: u32, height: u32, eight: bool) -> (Vec<u32>, usize) {
    let w = width as usize;
    let h = height as usize;
    let mut labels = vec![0u32; w * h];
    let mut parent: Vec<u32> = vec![0];

    fn root(parent: &mut [u32], mut x: u32) -> u32 {
        while parent[x as usize] != x {
            parent[x as usize] = parent[parent[x as usize] as usize];
            x = parent[x as usize];
        }
        x
    }

    for row in 0..h {
        for col in 0..w {
            let idx = row * w + col;
            if !mask[idx] {
                continue;
            }
            let mut neighbors = [0u32; 4];
            let mut count = 0;
            let mut push = |label: u32| {
                if label > 0 {
                    neighbors[count] = label;
                    count += 1;
                }
            };
            if col > 0 {
                push(labels[idx - 1]);
            }
            if row > 0 {
                push(labels[idx - w]);
                if eight && col > 0 {
                    push(labels[idx - w - 1]);
                }
                if eight && col + 1 < w {
                    push(labels[idx - w + 1]);
                }
            }

            let Some(&min) = neighbors[..count].iter().min() else {
                let next = parent.len() as u32;
                parent.push(next);
                labels[idx] = next;
                continue;
            };
            labels[idx] = min;
            for &n in &neighbors[..count] {
                let (ra, rb) = (root(&mut parent, min), root(&mut parent, n));
                if ra != rb {
                    parent[ra.max(rb) as usize] = ra.min(rb);
                }
            }
        }
    }

    // Flatten to sequential labels
    let mut remap = vec![0u32; parent.len()];
    let mut next = 0u32;
    for label in labels.iter_mut().filter(|l| **l > 0) {
        let r = root(&mut parent, *label) as usize;
        if remap[r] == 0 {
            next += 1;
            remap[r] = next;
        }
        *label = remap[r];
    }
    (labels, next as usize)
}

#[derive(Clone, Default)]
struct Moments {
    pixels: usize,
    sum_i: f64,
    sum_c: f64,
    sum_r: f64,
    sum_cc: f64,
    sum_rr: f64,
    sum_cr: f64,
    // Moments are taken relative to the first pixel seen to avoid
    // precision loss at large absolute coordinates.
    ref_col: f64,
    ref_row: f64,
}

fn blob_centroids(
    signal: &[f32],
    labels: &[u32],
    num_labels: usize,
    width: u32,
    bg_level: f32,
    config: &DetectConfig,
) -> Vec<Centroid> {
    let w = width as usize;
    let mut blobs = vec![Moments::default(); num_labels + 1];

    for (idx, (&label, &value)) in labels.iter().zip(signal).enumerate() {
        if label == 0 {
            continue;
        }
        let m = &mut blobs[label as usize];
        let (col, row) = ((idx % w) as f64, (idx / w) as f64);
        if m.pixels == 0 {
            m.ref_col = col;
            m.ref_row = row;
        }
        let i = (value - bg_level).max(0.0) as f64;
        let dc = col - m.ref_col;
        let dr = row - m.ref_row;
        m.pixels += 1;
        m.sum_i += i;
        m.sum_c += dc * i;
        m.sum_r += dr * i;
        m.sum_cc += dc * dc * i;
        m.sum_rr += dr * dr * i;
        m.sum_cr += dc * dr * i;
    }

    blobs
        .into_iter()
        .skip(1)
        .filter_map(|m| {
            if m.pixels < config.min_pixels || m.pixels > config.max_pixels || m.sum_i <= 0.0 {
                return None;
            }
            let dc = m.sum_c / m.sum_i;
            let dr = m.sum_r / m.sum_i;
            let cov = Matrix2::new(
                (m.sum_cc / m.sum_i - dc * dc) as f32,
                (m.sum_cr / m.sum_i - dc * dr) as f32,
                (m.sum_cr / m.sum_i - dc * dr) as f32,
                (m.sum_rr / m.sum_i - dr * dr) as f32,
            );
            if let Some(max) = config.max_elongation {
                if elongation(&cov) > max {
                    return None;
                }
            }
            Some(Centroid {
                row: (m.ref_row + dr) as f32,
                col: (m.ref_col + dc) as f32,
                mass: Some(m.sum_i as f32),
                cov: Some(cov),
            })
        })
        .collect()
}

/// Ratio of the major to the minor axis of a blob covariance.
fn elongation(cov: &Matrix2) -> f32 {
    let eig = SymmetricEigen::new(*cov);
    let major = eig.eigenvalues.max();
    let minor = eig.eigenvalues.min().max(1e-12);
    (major / minor).max(0.0).sqrt()
}
