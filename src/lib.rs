//! # tetra3-batch
//!
//! Batch harness around a star plate solver: for every image in a directory
//! it detects star centroids, renders them over the image for visual
//! checking, asks a solving engine for the astrometric solution and appends
//! a tabulated summary of that solution to a cumulative text report.
//!
//! ## Example
//!
//! ```no_run
//! use tetra3_batch::{
//!     BatchDriver, CommandSolver, DetectConfig, FileReport, OverlayDir, ReportWriter,
//!     SolverConfig, ThresholdDetector,
//! };
//!
//! let detector = ThresholdDetector::new(DetectConfig::default());
//! let solver = CommandSolver::new(SolverConfig::new("tetra3-solve", "default_database.npz"))?;
//! let mut overlays = OverlayDir::create("overlays")?;
//! let mut report = ReportWriter::new(FileReport::new("output_tetra3.txt"));
//!
//! let n = BatchDriver::new(&detector, &solver, &mut overlays, &mut report).run("data")?;
//! println!("Reported {n} images");
//! # Ok::<(), tetra3_batch::BatchError>(())
//! ```
//!
//! ## Pipeline
//!
//! 1. **Enumerate**: every entry of the input directory, in filesystem order
//! 2. **Detect**: a [`CentroidDetector`] returns `(row, col)` centroids,
//!    brightest first for the bundled [`ThresholdDetector`]
//! 3. **Overlay**: circles and index labels at `(x, y) = (col, row)`, handed
//!    to an [`OverlaySink`]
//! 4. **Solve**: a [`Solver`] turns the image (plus optional distortion
//!    coefficients) into an ordered [`Solution`]
//! 5. **Report**: one `>>> Results for: <name> <<<` block per image
//!
//! Any error aborts the run; the report keeps the blocks written so far.

pub mod batch;
mod centroid;
pub mod detect;
pub mod error;
mod image_record;
pub mod overlay;
pub mod report;
pub mod solution;
pub mod solver;

pub use batch::{list_images, BatchConfig, BatchDriver};
pub use centroid::*;
pub use detect::{
    detect_centroids, detect_centroids_from_raw, CentroidDetector, DetectConfig,
    ThresholdDetector,
};
pub use error::{BatchError, Result};
pub use image_record::{display_name, ImageRecord};
pub use overlay::{
    compute_markers, DiscardOverlays, OverlayConfig, OverlayDir, OverlayMarker, OverlayRenderer,
    OverlaySink,
};
pub use report::{format_block, FileReport, MemoryReport, ReportSink, ReportWriter};
pub use solution::{Solution, SolutionValue};
pub use solver::{parse_solution, CommandSolver, Solver, SolverConfig};

// Centroid covariance, as reported by the detector.
pub type Matrix2 = nalgebra::Matrix2<f32>;
