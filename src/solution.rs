//! Ordered solver output.
//!
//! A [`Solution`] is a mapping from field name to [`SolutionValue`] that
//! remembers insertion order; the report prints its rows in exactly that
//! order.

use std::fmt;

/// One solver result value.
#[derive(Debug, Clone, PartialEq)]
pub enum SolutionValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// Composite numeric value, e.g. per-star residuals.
    List(Vec<f64>),
    /// Field reported by the solver but without a value.
    Missing,
}

impl SolutionValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, SolutionValue::Missing)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SolutionValue::Int(_) | SolutionValue::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SolutionValue::Int(v) => Some(*v as f64),
            SolutionValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Parse one value as printed by a solving engine.
    ///
    /// `None` and the empty string are missing, `True`/`False` are
    /// booleans, bracketed comma-separated numbers are lists; anything
    /// that is not a number is kept as text.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        match s {
            "" | "None" => return SolutionValue::Missing,
            "True" => return SolutionValue::Bool(true),
            "False" => return SolutionValue::Bool(false),
            _ => {}
        }
        if let Ok(v) = s.parse::<i64>() {
            return SolutionValue::Int(v);
        }
        if let Ok(v) = s.parse::<f64>() {
            return SolutionValue::Float(v);
        }
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            if inner.trim().is_empty() {
                return SolutionValue::List(Vec::new());
            }
            let parsed: Option<Vec<f64>> = inner
                .split(',')
                .map(|item| item.trim().parse::<f64>().ok())
                .collect();
            if let Some(list) = parsed {
                return SolutionValue::List(list);
            }
        }
        SolutionValue::Text(s.to_string())
    }
}

impl fmt::Display for SolutionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolutionValue::Int(v) => write!(f, "{v}"),
            SolutionValue::Float(v) => f.write_str(&float_repr(*v)),
            SolutionValue::Bool(true) => f.write_str("True"),
            SolutionValue::Bool(false) => f.write_str("False"),
            SolutionValue::Text(s) => f.write_str(s),
            SolutionValue::List(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&float_repr(*v))?;
                }
                f.write_str("]")
            }
            SolutionValue::Missing => f.write_str("None"),
        }
    }
}

/// Shortest round-trip float text with a signed two-digit exponent
/// (`1e-05`, `1.5e+16`), the form solving engines print.
fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    let s = format!("{v:?}");
    let Some((mantissa, exponent)) = s.split_once('e') else {
        return s;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

impl From<f64> for SolutionValue {
    fn from(v: f64) -> Self {
        SolutionValue::Float(v)
    }
}

impl From<i64> for SolutionValue {
    fn from(v: i64) -> Self {
        SolutionValue::Int(v)
    }
}

impl From<bool> for SolutionValue {
    fn from(v: bool) -> Self {
        SolutionValue::Bool(v)
    }
}

impl From<&str> for SolutionValue {
    fn from(v: &str) -> Self {
        SolutionValue::Text(v.to_string())
    }
}

impl From<Vec<f64>> for SolutionValue {
    fn from(v: Vec<f64>) -> Self {
        SolutionValue::List(v)
    }
}

impl<T: Into<SolutionValue>> From<Option<T>> for SolutionValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SolutionValue::Missing, Into::into)
    }
}

/// Insertion-ordered field → value mapping produced once per image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    fields: Vec<(String, SolutionValue)>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. An existing field keeps its position and gets the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SolutionValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SolutionValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SolutionValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SolutionValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<SolutionValue>> FromIterator<(K, V)> for Solution {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut solution = Solution::new();
        for (k, v) in iter {
            solution.insert(k, v);
        }
        solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let s = Solution::new()
            .with("RA", 83.1)
            .with("Dec", -1.2)
            .with("Matches", 17i64)
            .with("Roll", 12.0);
        let names: Vec<&str> = s.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["RA", "Dec", "Matches", "Roll"]);
    }

    #[test]
    fn reinsert_keeps_position() {
        let mut s = Solution::new().with("RA", 1.0).with("Dec", 2.0);
        s.insert("RA", 3.0);
        assert_eq!(s.len(), 2);
        assert_eq!(s.iter().next(), Some(("RA", &SolutionValue::Float(3.0))));
    }

    #[test]
    fn option_maps_to_missing() {
        let s = Solution::new().with("RA", None::<f64>);
        assert_eq!(s.get("RA"), Some(&SolutionValue::Missing));
    }

    #[test]
    fn parse_values() {
        assert_eq!(SolutionValue::parse(" 2000 "), SolutionValue::Int(2000));
        assert_eq!(SolutionValue::parse("271.5"), SolutionValue::Float(271.5));
        assert_eq!(SolutionValue::parse("None"), SolutionValue::Missing);
        assert_eq!(SolutionValue::parse(""), SolutionValue::Missing);
        assert_eq!(SolutionValue::parse("True"), SolutionValue::Bool(true));
        assert_eq!(
            SolutionValue::parse("[-0.2, 0.1]"),
            SolutionValue::List(vec![-0.2, 0.1])
        );
        assert_eq!(SolutionValue::parse("[]"), SolutionValue::List(vec![]));
        assert_eq!(
            SolutionValue::parse("[a, 1]"),
            SolutionValue::Text("[a, 1]".to_string())
        );
        assert!(matches!(SolutionValue::parse("nan"), SolutionValue::Float(v) if v.is_nan()));
    }

    #[test]
    fn display_values() {
        assert_eq!(SolutionValue::Float(1.0).to_string(), "1.0");
        assert_eq!(SolutionValue::Float(271.123456789).to_string(), "271.123456789");
        assert_eq!(SolutionValue::List(vec![1.0, -0.5]).to_string(), "[1.0, -0.5]");
        assert_eq!(SolutionValue::Missing.to_string(), "None");
        assert_eq!(SolutionValue::Bool(false).to_string(), "False");
    }

    #[test]
    fn exponent_floats_use_signed_two_digit_exponent() {
        assert_eq!(SolutionValue::Float(1e-5).to_string(), "1e-05");
        assert_eq!(SolutionValue::Float(1e16).to_string(), "1e+16");
        assert_eq!(SolutionValue::Float(-1.5e-7).to_string(), "-1.5e-07");
        assert_eq!(SolutionValue::Float(2.5e100).to_string(), "2.5e+100");
        assert_eq!(SolutionValue::Float(0.0001).to_string(), "0.0001");
        assert_eq!(SolutionValue::Float(f64::NAN).to_string(), "nan");
        assert_eq!(SolutionValue::Float(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(
            SolutionValue::List(vec![1e-5, 0.5]).to_string(),
            "[1e-05, 0.5]"
        );
    }
}
