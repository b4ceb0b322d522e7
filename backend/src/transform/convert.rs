//! Cell type conversion.
//!
//! Conversions never fail loudly: [`convert_cell`] returns `None` when a cell
//! cannot be read as the target type and the caller decides what to leave in
//! its place.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::models::{parse_number, Cell, CellType};

/// Date-time layouts tried after RFC 3339 and RFC 2822. Naive values are UTC.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Date-only layouts, read as midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Convert a cell to `target`. `None` means the value has no reading as that type.
pub fn convert_cell(cell: &Cell, target: CellType) -> Option<Cell> {
    match target {
        CellType::Number => to_number(cell).map(Cell::Number),
        CellType::String => Some(Cell::Text(cell.to_string())),
        CellType::Boolean => Some(Cell::Boolean(cell.is_truthy())),
        CellType::Date => to_timestamp(cell).map(|dt| Cell::Text(format_timestamp(&dt))),
    }
}

fn to_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) => Some(*n),
        Cell::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Cell::Text(s) => parse_number(s),
        Cell::Null | Cell::Invalid { .. } => None,
    }
}

fn to_timestamp(cell: &Cell) -> Option<DateTime<Utc>> {
    match cell {
        // Epoch milliseconds
        Cell::Number(n) if n.fract() == 0.0 => Utc.timestamp_millis_opt(*n as i64).single(),
        Cell::Text(s) => parse_date(s),
        _ => None,
    }
}

/// Parse a calendar date or date-time in one of the accepted layouts.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

/// Canonical timestamp text: `YYYY-MM-DDTHH:MM:SS.sssZ`.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
