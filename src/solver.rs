//! Plate-solver seam.
//!
//! The astrometric solve itself (pattern matching against a star
//! database) is done by an external engine. [`Solver`] is the interface
//! the batch driver calls; [`CommandSolver`] adapts any engine that can be
//! run as a process and prints its solution as `name: value` lines, e.g.
//!
//! ```text
//! RA: 83.10124
//! Dec: -1.20471
//! Roll: 12.5
//! FOV: 15.02
//! Matches: 17
//! Prob: 1.2e-12
//! ```

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{BatchError, Result};
use crate::image_record::ImageRecord;
use crate::solution::{Solution, SolutionValue};

/// A configured solver holding its reference database.
///
/// Instances are constructed explicitly and passed to the driver, so
/// independent runs never share solver state.
pub trait Solver {
    /// Solve one image. `distortion` is an optional ordered list of
    /// distortion-model coefficients supplied as a search hint.
    fn solve(&self, image: &ImageRecord, distortion: Option<&[f32]>) -> Result<Solution>;
}

/// Configuration for [`CommandSolver`].
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Engine executable.
    pub program: PathBuf,
    /// Extra arguments placed before the generated ones.
    pub args: Vec<String>,
    /// Reference star-pattern database handed to every solve.
    pub database: PathBuf,
    /// Field that must be present and non-missing for the image to count
    /// as solved. `None` accepts any non-empty output.
    /// Default: Some("RA")
    pub required_field: Option<String>,
}

impl SolverConfig {
    pub fn new(program: impl Into<PathBuf>, database: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            database: database.into(),
            required_field: Some("RA".to_string()),
        }
    }
}

/// Runs an external solving engine once per image:
///
/// `<program> <args...> --database <db> [--distortion k1,k2,...] <image>`
#[derive(Debug, Clone)]
pub struct CommandSolver {
    config: SolverConfig,
}

impl CommandSolver {
    /// Validate the configuration; the database must be an existing file.
    pub fn new(config: SolverConfig) -> Result<Self> {
        let meta = std::fs::metadata(&config.database).map_err(|e| {
            BatchError::SolverSetup(format!(
                "cannot open database {}: {}",
                config.database.display(),
                e
            ))
        })?;
        if !meta.is_file() {
            return Err(BatchError::SolverSetup(format!(
                "database {} is not a file",
                config.database.display()
            )));
        }
        info!(
            "Solver {} using database {}",
            config.program.display(),
            config.database.display()
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn command(&self, image: &ImageRecord, distortion: Option<&[f32]>) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg("--database")
            .arg(&self.config.database);
        if let Some(coeffs) = distortion {
            let joined = coeffs
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(",");
            cmd.arg("--distortion").arg(joined);
        }
        cmd.arg(&image.path);
        cmd
    }
}

impl Solver for CommandSolver {
    fn solve(&self, image: &ImageRecord, distortion: Option<&[f32]>) -> Result<Solution> {
        let mut cmd = self.command(image, distortion);
        debug!("Command: {:?}", cmd);

        let solve_error = |reason: String| BatchError::Solve {
            image: image.name.clone(),
            reason,
        };

        let output = cmd.output().map_err(|e| {
            solve_error(format!(
                "failed to run {}: {}",
                self.config.program.display(),
                e
            ))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(solve_error(format!(
                "engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let solution = parse_solution(&String::from_utf8_lossy(&output.stdout));
        if solution.is_empty() {
            return Err(solve_error("engine printed no solution fields".to_string()));
        }
        if let Some(field) = &self.config.required_field {
            match solution.get(field) {
                Some(v) if !v.is_missing() => {}
                _ => return Err(solve_error(format!("no match ({field} missing)"))),
            }
        }
        debug!("Solved {} with {} fields", image.name, solution.len());
        Ok(solution)
    }
}

/// Parse `name: value` lines; other lines are ignored.
pub fn parse_solution(text: &str) -> Solution {
    text.lines()
        .filter_map(|line| {
            line.split_once(": ")
                .or_else(|| line.strip_suffix(':').map(|name| (name, "")))
        })
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, value)| (name.trim().to_string(), SolutionValue::parse(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage};

    #[test]
    fn parse_engine_output() {
        let text = concat!(
            "Solving...\n",
            "RA: 83.1\n",
            "Dec: -1.2\n",
            "Matches: 17\n",
            "\n",
            "RMSE: None\n",
            "distortion: [-0.2, 0.1]\n",
            "status:\n",
        );
        let s = parse_solution(text);
        let names: Vec<&str> = s.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["RA", "Dec", "Matches", "RMSE", "distortion", "status"]);
        assert_eq!(s.get("Matches"), Some(&SolutionValue::Int(17)));
        assert_eq!(s.get("RMSE"), Some(&SolutionValue::Missing));
        assert_eq!(s.get("status"), Some(&SolutionValue::Missing));
        assert_eq!(
            s.get("distortion"),
            Some(&SolutionValue::List(vec![-0.2, 0.1]))
        );
    }

    #[test]
    fn missing_database_is_setup_error() {
        let config = SolverConfig::new("solve", "no/such/database.npz");
        let err = CommandSolver::new(config).unwrap_err();
        assert!(matches!(err, BatchError::SolverSetup(_)));
    }

    #[test]
    fn command_line_layout() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("default_database.npz");
        std::fs::write(&db, b"db").unwrap();

        let mut config = SolverConfig::new("tetra3-solve", &db);
        config.args = vec!["--fov".to_string(), "15".to_string()];
        let solver = CommandSolver::new(config).unwrap();
        let image = ImageRecord::from_image(
            "data/frame.png",
            DynamicImage::ImageLuma8(GrayImage::new(1, 1)),
        );

        let cmd = solver.command(&image, Some(&[-0.2, 0.1]));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "--fov".to_string(),
                "15".to_string(),
                "--database".to_string(),
                db.display().to_string(),
                "--distortion".to_string(),
                "-0.2,0.1".to_string(),
                "data/frame.png".to_string(),
            ]
        );

        let cmd = solver.command(&image, None);
        assert!(!cmd
            .get_args()
            .any(|a| a == std::ffi::OsStr::new("--distortion")));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::path::Path;

        // The engine is a shell script run through /bin/sh.
        fn solver(dir: &Path, body: &str) -> CommandSolver {
            let script = dir.join("engine.sh");
            std::fs::write(&script, format!("{body}\n")).unwrap();
            let db = dir.join("db.npz");
            std::fs::write(&db, b"db").unwrap();
            let mut config = SolverConfig::new("/bin/sh", db);
            config.args = vec![script.display().to_string()];
            CommandSolver::new(config).unwrap()
        }

        fn image() -> ImageRecord {
            ImageRecord::from_image("frame.png", DynamicImage::ImageLuma8(GrayImage::new(1, 1)))
        }

        #[test]
        fn solves_from_stdout() {
            let dir = tempfile::tempdir().unwrap();
            let solver = solver(dir.path(), "printf 'RA: 83.1\\nDec: -1.2\\nMatches: 17\\n'");
            let s = solver.solve(&image(), Some(&[-0.2, 0.1])).unwrap();
            assert_eq!(s.get("RA"), Some(&SolutionValue::Float(83.1)));
            assert_eq!(s.len(), 3);
        }

        #[test]
        fn unsolved_image_is_solve_error() {
            let dir = tempfile::tempdir().unwrap();
            let solver = solver(dir.path(), "printf 'RA: None\\nDec: None\\nT_solve: 12.0\\n'");
            let err = solver.solve(&image(), None).unwrap_err();
            assert!(matches!(err, BatchError::Solve { .. }));
        }

        #[test]
        fn failing_engine_is_solve_error() {
            let dir = tempfile::tempdir().unwrap();
            let solver = solver(dir.path(), "echo 'database corrupt' >&2; exit 3");
            let err = solver.solve(&image(), None).unwrap_err();
            assert!(err.to_string().contains("database corrupt"));
        }
    }
}
