//! Cumulative text report: one block per processed image.
//!
//! The report is truncated once at the start of a run and then only ever
//! appended to. Every block is written with a single `write_all`, so a
//! run that aborts leaves complete blocks for the images processed before
//! the failure and nothing else.
//!
//! Block layout:
//!
//! ```text
//! >>> Results for: frame_01.png <<<
//!
//! Variable      Result
//! ----------  --------
//! RA           83.1012
//! ...
//!
//! ============================================================
//!
//! ```

pub mod table;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{BatchError, Result};
use crate::solution::Solution;

/// Width of the `=` rule closing each block.
pub const RULE_WIDTH: usize = 60;

/// Format one report block for `name`.
pub fn format_block(name: &str, solution: &Solution) -> String {
    format!(
        ">>> Results for: {name} <<<\n\n{}\n\n{}\n\n",
        table::render(solution),
        "=".repeat(RULE_WIDTH)
    )
}

/// Storage behind a [`ReportWriter`].
pub trait ReportSink {
    /// Discard all previous contents (creating the target if needed).
    fn truncate(&mut self) -> io::Result<()>;

    /// Append one complete block.
    fn append(&mut self, block: &str) -> io::Result<()>;

    /// Release anything the sink holds open.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Where the report lives, for error messages.
    fn location(&self) -> PathBuf;
}

/// Report file on disk.
///
/// No handle is kept between calls: every append opens the file in append
/// mode, writes the block and drops the handle.
#[derive(Debug, Clone)]
pub struct FileReport {
    path: PathBuf,
}

impl FileReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for FileReport {
    fn truncate(&mut self) -> io::Result<()> {
        File::create(&self.path).map(drop)
    }

    fn append(&mut self, block: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// In-memory report, for tests and for callers that post-process the text.
#[derive(Debug, Clone, Default)]
pub struct MemoryReport {
    contents: String,
}

impl MemoryReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

impl ReportSink for MemoryReport {
    fn truncate(&mut self) -> io::Result<()> {
        self.contents.clear();
        Ok(())
    }

    fn append(&mut self, block: &str) -> io::Result<()> {
        self.contents.push_str(block);
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}

/// Owns the report lifecycle: `reset` once, `append` per image, `close` at the end.
#[derive(Debug)]
pub struct ReportWriter<S: ReportSink> {
    sink: S,
    blocks: usize,
    closed: bool,
}

impl<S: ReportSink> ReportWriter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            blocks: 0,
            closed: false,
        }
    }

    /// Truncate the report. Reopens a closed writer.
    pub fn reset(&mut self) -> Result<()> {
        self.sink.truncate().map_err(|e| self.io_error(e))?;
        self.blocks = 0;
        self.closed = false;
        debug!("Report {} reset", self.sink.location().display());
        Ok(())
    }

    /// Append the block for one image.
    pub fn append(&mut self, name: &str, solution: &Solution) -> Result<()> {
        if self.closed {
            return Err(self.io_error(io::Error::other("report is closed")));
        }
        let block = format_block(name, solution);
        self.sink.append(&block).map_err(|e| self.io_error(e))?;
        self.blocks += 1;
        debug!(
            "Appended block {} ({} fields) for {}",
            self.blocks,
            solution.len(),
            name
        );
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.sink.close().map_err(|e| self.io_error(e))?;
        self.closed = true;
        Ok(())
    }

    /// Number of blocks appended since the last reset.
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn io_error(&self, source: io::Error) -> BatchError {
        BatchError::Report {
            path: self.sink.location(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution(ra: f64) -> Solution {
        Solution::new().with("RA", ra).with("Dec", -1.5)
    }

    #[test]
    fn block_layout() {
        let block = format_block("frame.png", &Solution::new().with("Matches", 17i64));
        let expected = concat!(
            ">>> Results for: frame.png <<<\n",
            "\n",
            "Variable      Result\n",
            "----------  --------\n",
            "Matches           17\n",
            "\n",
            "============================================================\n",
            "\n",
        );
        assert_eq!(block, expected);
    }

    #[test]
    fn reset_then_nothing_is_empty() {
        let mut writer = ReportWriter::new(MemoryReport::new());
        writer.reset().unwrap();
        writer.close().unwrap();
        assert_eq!(writer.sink().contents(), "");
        assert_eq!(writer.blocks(), 0);
    }

    #[test]
    fn appends_in_call_order() {
        let mut writer = ReportWriter::new(MemoryReport::new());
        writer.reset().unwrap();
        writer.append("a.png", &solution(1.0)).unwrap();
        writer.append("b.png", &solution(2.0)).unwrap();
        writer.append("c.png", &solution(3.0)).unwrap();
        let text = writer.into_sink().contents().to_string();

        let a = text.find(">>> Results for: a.png").unwrap();
        let b = text.find(">>> Results for: b.png").unwrap();
        let c = text.find(">>> Results for: c.png").unwrap();
        assert!(a < b && b < c);
        assert_eq!(
            text,
            [
                format_block("a.png", &solution(1.0)),
                format_block("b.png", &solution(2.0)),
                format_block("c.png", &solution(3.0)),
            ]
            .concat()
        );
    }

    #[test]
    fn append_after_close_fails() {
        let mut writer = ReportWriter::new(MemoryReport::new());
        writer.reset().unwrap();
        writer.close().unwrap();
        let err = writer.append("a.png", &solution(1.0)).unwrap_err();
        assert!(matches!(err, BatchError::Report { .. }));
    }

    #[test]
    fn file_report_truncates_once_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        std::fs::write(&path, "stale contents from a previous run\n").unwrap();

        let mut writer = ReportWriter::new(FileReport::new(&path));
        writer.reset().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        writer.append("a.png", &solution(1.0)).unwrap();
        writer.append("b.png", &solution(2.0)).unwrap();
        writer.close().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            format_block("a.png", &solution(1.0)) + &format_block("b.png", &solution(2.0))
        );
        assert_eq!(text.matches(">>> Results for:").count(), 2);
    }

    #[test]
    fn file_report_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ReportWriter::new(FileReport::new(dir.path().join("missing/out.txt")));
        let err = writer.reset().unwrap_err();
        assert!(matches!(err, BatchError::Report { .. }));
    }
}
