//! Invoice date normalization.
//!
//! Dates in the `Fecha` column arrive in whatever shape the spreadsheet
//! author used: `15-03-2024` text, native date cells, raw serial numbers or
//! free-form strings. Everything that can be understood becomes `YYYY-MM-DD`;
//! anything else is passed through untouched.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::CellValue;

/// Text that is a plain number (what a serial date looks like as text).
static NUMERIC_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?\s*$").unwrap());

/// Leading integer of a dash-separated date part, time suffix allowed.
static DATE_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)(\s+.*)?$").unwrap());

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d-%b-%Y",
    "%Y%m%d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Outcome of normalizing a date cell.
#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    /// The cell was blank.
    Missing,
    /// `YYYY-MM-DD`
    Normalized(String),
    /// Not understood; the original value is kept.
    Passthrough(CellValue),
}

impl DateValue {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, DateValue::Passthrough(_))
    }

    pub fn into_cell(self) -> CellValue {
        match self {
            DateValue::Missing => CellValue::Empty,
            DateValue::Normalized(s) => CellValue::Text(s),
            DateValue::Passthrough(v) => v,
        }
    }
}

/// Normalize a date cell to `YYYY-MM-DD`.
///
/// Rules, first match wins:
/// 1. blank → missing
/// 2. text with exactly three numeric dash-separated parts → day-month-year
///    (year-month-day when the first part has four digits)
/// 3. native date cell
/// 4. number or numeric text → spreadsheet serial date
/// 5. common textual formats
///
/// Anything else is returned unchanged.
pub fn format_date(cell: &CellValue) -> DateValue {
    if cell.is_blank() {
        return DateValue::Missing;
    }

    if let CellValue::Text(s) = cell {
        if s.contains('-') {
            if let Some(date) = parse_dashed(s) {
                return DateValue::Normalized(date);
            }
        }
    }

    let parsed = match cell {
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Number(n) => serial_to_date(*n),
        CellValue::Text(s) if NUMERIC_TEXT.is_match(s) => {
            s.trim().parse::<f64>().ok().and_then(serial_to_date)
        }
        CellValue::Text(s) => parse_text(s),
        _ => None,
    };

    match parsed {
        Some(date) => DateValue::Normalized(date.format("%Y-%m-%d").to_string()),
        None => DateValue::Passthrough(cell.clone()),
    }
}

/// `DD-MM-YYYY` (or `YYYY-MM-DD`) reformatted with zero padding.
///
/// Parts are not range-checked: `45-13-2024` becomes `2024-13-45`, which is
/// how the import side has always received such typos.
fn parse_dashed(s: &str) -> Option<String> {
    let parts: Vec<&str> = s.trim().split('-').collect();
    if parts.len() != 3 {
        return None;
    }

    let mut numbers = [0u32; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        let caps = DATE_PART.captures(part)?;
        *slot = caps[1].parse().ok()?;
    }

    let (year, month, day) = if parts[0].trim().len() == 4 {
        (numbers[0], numbers[1], numbers[2])
    } else {
        (numbers[2], numbers[1], numbers[0])
    };

    Some(format!("{:04}-{:02}-{:02}", year, month, day))
}

/// Convert a spreadsheet serial number (1900 date system) to a date.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }

    // Serial 60 is the phantom 1900-02-29; dates before it use a base one
    // day later. Values below 1 count whole days from the Unix epoch.
    let base = if serial < 1.0 {
        NaiveDate::from_ymd_opt(1970, 1, 1)?
    } else if serial < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };

    let days = serial.floor();
    if days.abs() > 3_000_000.0 {
        return None;
    }
    base.checked_add_signed(Duration::days(days as i64))
}

/// Generic parse over the textual formats seen in supplier sheets.
fn parse_text(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}
