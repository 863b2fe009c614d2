//! Transformation module.
//!
//! - Dates: `Fecha` normalization to `YYYY-MM-DD`
//! - Converter: invoice rows to one row per item type
//! - Pipeline: ingest, convert and emit in one call

pub mod converter;
pub mod dates;
pub mod pipeline;

pub use converter::{convert_rows, Conversion};
pub use dates::{format_date, DateValue};
pub use pipeline::*;
