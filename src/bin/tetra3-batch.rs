use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tetra3_batch::{
    BatchConfig, BatchDriver, CommandSolver, DetectConfig, DiscardOverlays, FileReport,
    OverlayConfig, OverlayDir, OverlayRenderer, OverlaySink, ReportWriter, SolverConfig,
    ThresholdDetector,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tetra3-batch")]
#[command(about = "Detect, overlay and plate-solve every image in a directory")]
struct Cli {
    /// Directory of input images
    #[arg(long, default_value = "data")]
    input: PathBuf,

    /// Report file, truncated at the start of the run
    #[arg(long, default_value = "output_tetra3.txt")]
    report: PathBuf,

    /// Write `<stem>_centroids.png` overlays here (overlays are discarded if unset)
    #[arg(long)]
    overlay_dir: Option<PathBuf>,

    /// Solving engine executable
    #[arg(long)]
    solver: PathBuf,

    /// Extra argument for the engine (repeatable)
    #[arg(long = "solver-arg", allow_hyphen_values = true)]
    solver_args: Vec<String>,

    /// Reference star-pattern database
    #[arg(long)]
    database: PathBuf,

    /// Distortion coefficients passed to every solve
    #[arg(
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_value = "-0.2,0.1",
        conflicts_with = "no_distortion"
    )]
    distortion: Vec<f32>,

    /// Let the engine use its own distortion model
    #[arg(long)]
    no_distortion: bool,

    /// Overlay circle radius in pixels
    #[arg(long, default_value = "5")]
    radius: f32,
}

impl Cli {
    fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            args: self.solver_args.clone(),
            ..SolverConfig::new(&self.solver, &self.database)
        }
    }

    fn overlay_config(&self) -> OverlayConfig {
        OverlayConfig {
            radius: self.radius,
            ..Default::default()
        }
    }

    fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            distortion: (!self.no_distortion).then(|| self.distortion.clone()),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let detector = ThresholdDetector::new(DetectConfig::default());
    let solver = CommandSolver::new(cli.solver_config()).context("Failed to set up solver")?;

    let mut overlays: Box<dyn OverlaySink> = match &cli.overlay_dir {
        Some(dir) => Box::new(
            OverlayDir::create(dir)
                .with_context(|| format!("Failed to create overlay directory {}", dir.display()))?,
        ),
        None => Box::new(DiscardOverlays),
    };

    let mut report = ReportWriter::new(FileReport::new(&cli.report));
    let n = BatchDriver::new(&detector, &solver, overlays.as_mut(), &mut report)
        .with_renderer(OverlayRenderer::new(cli.overlay_config()))
        .with_config(cli.batch_config())
        .run(&cli.input)
        .with_context(|| format!("Batch run over {} failed", cli.input.display()))?;

    println!("Wrote {} result blocks to {}", n, cli.report.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const REQUIRED: [&str; 5] = ["tetra3-batch", "--solver", "solve", "--database", "db.npz"];

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(REQUIRED.iter().chain(extra))
    }

    #[test]
    fn defaults_match_batch_script() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.input, Path::new("data"));
        assert_eq!(cli.report, Path::new("output_tetra3.txt"));
        assert!(cli.overlay_dir.is_none());
        assert_eq!(cli.batch_config().distortion, Some(vec![-0.2, 0.1]));
        assert_eq!(cli.overlay_config().radius, 5.0);

        let solver = cli.solver_config();
        assert_eq!(solver.program, Path::new("solve"));
        assert_eq!(solver.database, Path::new("db.npz"));
        assert!(solver.args.is_empty());
        assert_eq!(solver.required_field.as_deref(), Some("RA"));
    }

    #[test]
    fn solver_and_database_are_required() {
        assert!(Cli::try_parse_from(["tetra3-batch", "--solver", "solve"]).is_err());
        assert!(Cli::try_parse_from(["tetra3-batch", "--database", "db.npz"]).is_err());
    }

    #[test]
    fn distortion_and_radius_flags() {
        let cli = parse(&["--distortion", "-0.3,0.05", "--radius", "8"]).unwrap();
        assert_eq!(cli.batch_config().distortion, Some(vec![-0.3, 0.05]));
        assert_eq!(cli.overlay_config().radius, 8.0);

        let cli = parse(&["--no-distortion"]).unwrap();
        assert_eq!(cli.batch_config().distortion, None);
    }

    #[test]
    fn no_distortion_conflicts_with_explicit_coefficients() {
        let err = parse(&["--no-distortion", "--distortion", "0.1"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn solver_args_may_start_with_hyphens() {
        let cli = parse(&["--solver-arg", "--fov", "--solver-arg", "15"]).unwrap();
        assert_eq!(cli.solver_config().args, ["--fov", "15"]);
    }
}
