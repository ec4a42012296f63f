//! Per-directory batch loop.
//!
//! For every directory entry, in enumeration order:
//! load → detect centroids → render and present the overlay → solve →
//! append the report block. The first error from any step aborts the run;
//! blocks already appended stay in the report.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::detect::CentroidDetector;
use crate::error::{BatchError, Result};
use crate::image_record::ImageRecord;
use crate::overlay::{OverlayRenderer, OverlaySink};
use crate::report::{ReportSink, ReportWriter};
use crate::solver::Solver;

/// Run-wide settings.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Distortion coefficients passed to every solve, or `None` to let the
    /// solver use its own model.
    /// Default: Some([-0.2, 0.1])
    pub distortion: Option<Vec<f32>>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            distortion: Some(vec![-0.2, 0.1]),
        }
    }
}

/// Every entry of `dir`, in the order the filesystem yields them.
///
/// Nothing is filtered or sorted; an entry the image loader cannot decode
/// will abort the run when its turn comes.
pub fn list_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let read_dir_error = |source| BatchError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::read_dir(dir)
        .map_err(read_dir_error)?
        .map(|entry| entry.map(|e| e.path()).map_err(read_dir_error))
        .collect()
}

/// Drives one batch run. Collaborators are borrowed, so a caller (or test)
/// can inspect the report and overlay sinks after the run.
pub struct BatchDriver<'a, S: ReportSink> {
    detector: &'a dyn CentroidDetector,
    solver: &'a dyn Solver,
    renderer: OverlayRenderer,
    overlays: &'a mut dyn OverlaySink,
    report: &'a mut ReportWriter<S>,
    config: BatchConfig,
}

impl<'a, S: ReportSink> BatchDriver<'a, S> {
    pub fn new(
        detector: &'a dyn CentroidDetector,
        solver: &'a dyn Solver,
        overlays: &'a mut dyn OverlaySink,
        report: &'a mut ReportWriter<S>,
    ) -> Self {
        Self {
            detector,
            solver,
            renderer: OverlayRenderer::default(),
            overlays,
            report,
            config: BatchConfig::default(),
        }
    }

    pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Process every entry of `dir`. Returns the number of images reported.
    ///
    /// The report is truncated before the directory is read, so a run that
    /// fails at any point leaves only the blocks it wrote itself.
    pub fn run(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        self.report.reset()?;

        let paths = list_images(dir)?;
        info!("Found {} entries in {}", paths.len(), dir.display());
        for path in &paths {
            self.process(path)?;
        }
        self.report.close()?;

        info!("Processed {} images", paths.len());
        Ok(paths.len())
    }

    /// Run the full pipeline for one image file.
    pub fn process(&mut self, path: &Path) -> Result<()> {
        let image = ImageRecord::load(path)?;

        let centroids = self.detector.detect(&image)?;
        debug!("{}: {} centroids", image.name, centroids.len());

        let overlay = self.renderer.render(&image, &centroids);
        self.overlays.present(&image, &overlay)?;

        info!("Solving for image at: {}", path.display());
        let solution = self
            .solver
            .solve(&image, self.config.distortion.as_deref())?;

        self.report.append(&image.name, &solution)
    }
}
