//! Plain-text `Variable | Result` table.
//!
//! Layout:
//!
//! ```text
//! Variable      Result
//! ----------  --------
//! RA           83.1012
//! Dec          -1.2047
//! Matches      17
//! ```
//!
//! Each column is at least two characters wider than its header, columns
//! are separated by two spaces and every cell is padded to the column
//! width. A result column holding only numbers (missing values aside) is
//! numeric: floats get six significant digits, decimal points line up,
//! and the column is right-aligned. Any other column is left-aligned text.

use crate::solution::{Solution, SolutionValue};

const HEADERS: [&str; 2] = ["Variable", "Result"];
const COLUMN_SEPARATOR: &str = "  ";
const HEADER_PADDING: usize = 2;
const SIGNIFICANT_DIGITS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Int,
    Float,
    Text,
}

struct Column {
    header: &'static str,
    cells: Vec<String>,
    numeric: bool,
    width: usize,
}

impl Column {
    fn text(header: &'static str, cells: Vec<String>) -> Self {
        Self::new(header, cells, false)
    }

    fn numeric(header: &'static str, cells: Vec<String>) -> Self {
        let decimals: Vec<Option<usize>> = cells.iter().map(|c| digits_after_point(c)).collect();
        let widest = decimals.iter().map(|d| d.map_or(0, |n| n + 1)).max().unwrap_or(0);
        let cells = cells
            .into_iter()
            .zip(decimals)
            .map(|(cell, d)| {
                let pad = widest - d.map_or(0, |n| n + 1);
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect();
        Self::new(header, cells, true)
    }

    fn new(header: &'static str, cells: Vec<String>, numeric: bool) -> Self {
        let width = cells
            .iter()
            .map(|c| c.chars().count())
            .chain(std::iter::once(header.chars().count() + HEADER_PADDING))
            .max()
            .unwrap_or(0);
        Self {
            header,
            cells,
            numeric,
            width,
        }
    }

    fn pad(&self, s: &str) -> String {
        if self.numeric {
            format!("{s:>width$}", width = self.width)
        } else {
            format!("{s:<width$}", width = self.width)
        }
    }
}

/// Render a solution as a two-column table, one row per field in solution order.
pub fn render(solution: &Solution) -> String {
    let names = Column::text(HEADERS[0], solution.iter().map(|(n, _)| n.to_string()).collect());

    let values: Vec<&SolutionValue> = solution.iter().map(|(_, v)| v).collect();
    let results = match column_kind(&values) {
        Kind::Text => Column::text(HEADERS[1], values.iter().map(|v| text_cell(v)).collect()),
        kind => Column::numeric(
            HEADERS[1],
            values.iter().map(|v| numeric_cell(v, kind)).collect(),
        ),
    };

    let columns = [names, results];
    let mut lines = Vec::with_capacity(solution.len() + 2);
    lines.push(join(columns.iter().map(|c| c.pad(c.header))));
    lines.push(join(columns.iter().map(|c| "-".repeat(c.width))));
    for row in 0..solution.len() {
        lines.push(join(columns.iter().map(|c| c.pad(&c.cells[row]))));
    }
    lines.join("\n")
}

fn join(cells: impl Iterator<Item = String>) -> String {
    cells.collect::<Vec<_>>().join(COLUMN_SEPARATOR)
}

fn column_kind(values: &[&SolutionValue]) -> Kind {
    let present: Vec<&&SolutionValue> = values.iter().filter(|v| !v.is_missing()).collect();
    if present.is_empty() {
        Kind::Text
    } else if present.iter().all(|v| matches!(v, SolutionValue::Int(_))) {
        Kind::Int
    } else if present.iter().all(|v| v.is_numeric()) {
        Kind::Float
    } else {
        Kind::Text
    }
}

fn text_cell(value: &SolutionValue) -> String {
    match value {
        SolutionValue::Missing => String::new(),
        v => v.to_string(),
    }
}

fn numeric_cell(value: &SolutionValue, kind: Kind) -> String {
    match (value, kind) {
        (SolutionValue::Int(v), Kind::Int) => v.to_string(),
        (v, _) => v.as_f64().map(format_general).unwrap_or_default(),
    }
}

/// Digits after the decimal point (or after the exponent marker when
/// there is no point). `None` for integers and empty cells.
fn digits_after_point(cell: &str) -> Option<usize> {
    let pos = cell.rfind('.').or_else(|| cell.rfind(['e', 'E']))?;
    Some(cell.len() - pos - 1)
}

/// `printf("%g")`: six significant digits, trailing zeros removed,
/// scientific notation below 1e-4 and from 1e6 up.
pub fn format_general(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, v);
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        return sci;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{v:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
