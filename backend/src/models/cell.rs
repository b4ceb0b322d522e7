//! Tagged cell values.
//!
//! A cell's variant is decided once, at ingestion, and carried through every
//! later stage. Nothing downstream re-guesses whether `"42"` is a number
//! unless it explicitly asks for a numeric reading via [`Cell::as_number`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Numbers accepted by dynamic typing and numeric readings of text.
static NUMERIC: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?$").ok());

// =============================================================================
// Cell Type
// =============================================================================

/// Logical column type, used both for inference and as a conversion target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Number,
    String,
    Boolean,
    Date,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Number => "number",
            CellType::String => "string",
            CellType::Boolean => "boolean",
            CellType::Date => "date",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CellType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "number" => Ok(CellType::Number),
            "string" => Ok(CellType::String),
            "boolean" => Ok(CellType::Boolean),
            "date" => Ok(CellType::Date),
            other => Err(format!("unknown type '{}' (expected number, string, boolean or date)", other)),
        }
    }
}

// =============================================================================
// Cell
// =============================================================================

/// A single scalar value in a table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// No value. Missing keys in sparse rows read as this too.
    #[default]
    Null,
    Boolean(bool),
    /// Always finite.
    Number(f64),
    Text(String),
    /// Left behind by a failed conversion to `target`; `raw` is the source text.
    Invalid { target: CellType, raw: String },
}

/// Hashable identity of a cell, for naive set-based uniqueness.
///
/// `Number(1)` and `Text("1")` are different values; `0` and `-0` are the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Null,
    Boolean(bool),
    Number(u64),
    Text(String),
    Invalid(CellType),
}

impl Cell {
    /// Build a cell from a raw CSV field.
    ///
    /// With `dynamic_typing`, numeric text becomes [`Cell::Number`],
    /// `true`/`TRUE`/`false`/`FALSE` become [`Cell::Boolean`]
    /// and empty fields become [`Cell::Null`]. Without it every field is text.
    pub fn from_raw(raw: &str, dynamic_typing: bool) -> Self {
        if !dynamic_typing {
            return Cell::Text(raw.to_string());
        }

        match raw {
            "" => Cell::Null,
            "true" | "TRUE" => Cell::Boolean(true),
            "false" | "FALSE" => Cell::Boolean(false),
            _ => match parse_number(raw) {
                Some(n) => Cell::Number(n),
                None => Cell::Text(raw.to_string()),
            },
        }
    }

    /// Shorthand for a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Null, missing, or the empty string.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Cell::Invalid { .. })
    }

    /// Numeric reading of this cell, if it has one.
    ///
    /// Numbers read as themselves, text reads as a number when it matches the
    /// numeric grammar. Booleans, nulls and invalid cells have no reading.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// JavaScript-style truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Cell::Null | Cell::Invalid { .. } => false,
            Cell::Boolean(b) => *b,
            Cell::Number(n) => *n != 0.0,
            Cell::Text(s) => !s.is_empty(),
        }
    }

    pub fn unique_key(&self) -> CellKey {
        match self {
            Cell::Null => CellKey::Null,
            Cell::Boolean(b) => CellKey::Boolean(*b),
            Cell::Number(n) => {
                let normalized = if *n == 0.0 { 0.0 } else { *n };
                CellKey::Number(normalized.to_bits())
            }
            Cell::Text(s) => CellKey::Text(s.clone()),
            Cell::Invalid { target, .. } => CellKey::Invalid(*target),
        }
    }

    /// JSON view of the cell, as sent to API clients.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Boolean(b) => Value::Bool(*b),
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Invalid { .. } => Value::String(self.to_string()),
        }
    }
}

/// Parse text that matches the numeric grammar (surrounding whitespace allowed).
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if !NUMERIC.as_ref().is_some_and(|re| re.is_match(trimmed)) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Shortest textual form of a number (`3`, `2.5`, `0.1`).
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // -0 prints as "-0"
        return "0".to_string();
    }
    n.to_string()
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Boolean(b) => write!(f, "{}", b),
            Cell::Number(n) => f.write_str(&format_number(*n)),
            Cell::Text(s) => f.write_str(s),
            Cell::Invalid { target: CellType::Number, .. } => f.write_str("NaN"),
            Cell::Invalid { target: CellType::Date, .. } => f.write_str("Invalid Date"),
            Cell::Invalid { raw, .. } => f.write_str(raw),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Boolean(value)
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Boolean(b),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Null),
            Value::String(s) => Cell::Text(s),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Boolean(b) => serializer.serialize_bool(*b),
            Cell::Number(n) => serializer.serialize_f64(*n),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Invalid { .. } => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Cell::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_typing() {
        assert_eq!(Cell::from_raw("42", true), Cell::Number(42.0));
        assert_eq!(Cell::from_raw("-3.5", true), Cell::Number(-3.5));
        assert_eq!(Cell::from_raw("1e3", true), Cell::Number(1000.0));
        assert_eq!(Cell::from_raw(".5", true), Cell::Number(0.5));
        assert_eq!(Cell::from_raw("TRUE", true), Cell::Boolean(true));
        assert_eq!(Cell::from_raw("false", true), Cell::Boolean(false));
        assert_eq!(Cell::from_raw("", true), Cell::Null);
        assert_eq!(Cell::from_raw("12abc", true), Cell::text("12abc"));
        assert_eq!(Cell::from_raw("0x1F", true), Cell::text("0x1F"));
    }

    #[test]
    fn test_title_case_booleans_stay_text() {
        assert_eq!(Cell::from_raw("True", true), Cell::text("True"));
        assert_eq!(Cell::from_raw("False", true), Cell::text("False"));
        assert_eq!(Cell::from_raw("yes", true), Cell::text("yes"));
    }

    #[test]
    fn test_leading_zero_identifiers_become_numbers() {
        // Known lossiness: zip codes lose their leading zero.
        assert_eq!(Cell::from_raw("02139", true), Cell::Number(2139.0));
        assert_eq!(Cell::from_raw("02139", false), Cell::text("02139"));
    }

    #[test]
    fn test_no_dynamic_typing_keeps_text() {
        assert_eq!(Cell::from_raw("", false), Cell::text(""));
        assert_eq!(Cell::from_raw("true", false), Cell::text("true"));
    }

    #[test]
    fn test_missing_predicate() {
        assert!(Cell::Null.is_missing());
        assert!(Cell::text("").is_missing());
        assert!(!Cell::text(" ").is_missing());
        assert!(!Cell::text("null").is_missing());
        assert!(!Cell::Number(0.0).is_missing());
    }

    #[test]
    fn test_numeric_reading() {
        assert_eq!(Cell::text(" 7 ").as_number(), Some(7.0));
        assert_eq!(Cell::text("Infinity").as_number(), None);
        assert_eq!(Cell::text("NaN").as_number(), None);
        assert_eq!(Cell::Boolean(true).as_number(), None);
    }

    #[test]
    fn test_unique_key_distinguishes_types() {
        assert_ne!(Cell::Number(1.0).unique_key(), Cell::text("1").unique_key());
        assert_eq!(Cell::Number(0.0).unique_key(), Cell::Number(-0.0).unique_key());
    }

    #[test]
    fn test_display() {
        assert_eq!(Cell::Number(3.0).to_string(), "3");
        assert_eq!(Cell::Number(2.5).to_string(), "2.5");
        assert_eq!(Cell::Number(-0.0).to_string(), "0");
        assert_eq!(Cell::Null.to_string(), "");
        let invalid = Cell::Invalid { target: CellType::Number, raw: "abc".into() };
        assert_eq!(invalid.to_string(), "NaN");
    }

    #[test]
    fn test_truthiness() {
        assert!(Cell::text("false").is_truthy());
        assert!(!Cell::text("").is_truthy());
        assert!(!Cell::Number(0.0).is_truthy());
        assert!(!Cell::Null.is_truthy());
    }

    #[test]
    fn test_json_roundtrip() {
        let cells = vec![Cell::Null, Cell::Boolean(true), Cell::Number(1.5), Cell::text("x")];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"[null,true,1.5,"x"]"#);
        let back: Vec<Cell> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cells);
    }

    #[test]
    fn test_cell_type_from_str() {
        assert_eq!("Number".parse::<CellType>(), Ok(CellType::Number));
        assert!("integer".parse::<CellType>().is_err());
    }
}
