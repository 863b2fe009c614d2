//! Domain models for the conversion pipeline.
//!
//! This module contains the core data structures shared by every stage:
//!
//! - [`CellValue`] - A scalar read from (or written to) a worksheet cell
//! - [`ItemType`] - The seven purchase line-item categories and their tax codes
//! - [`InvoiceIdentity`] - Parent-invoice fields carried by the first output row
//! - [`OutputRow`] - One normalized `IMPORT` row
//! - [`ConversionStats`] - Statistics reported back to the caller

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;

// =============================================================================
// Sheet / column constants
// =============================================================================

/// Worksheet holding one row per invoice.
pub const INPUT_SHEET: &str = "COLUMNA";

/// Worksheet written to the generated workbook.
pub const OUTPUT_SHEET: &str = "IMPORT";

/// Cell value marking the header row of the input sheet.
pub const HEADER_MARKER: &str = "NIT";

/// Journal assigned to every converted invoice.
pub const JOURNAL: &str = "Facturas de Proveedores";

pub const COL_TAX_ID: &str = "NIT";
pub const COL_SUPPLIER: &str = "Proveedor";
pub const COL_REF: &str = "CONSECUTIVO";
pub const COL_DATE: &str = "Fecha";
pub const COL_CUFE: &str = "CUFE";

/// Columns that must be present in the header row, checked in this order.
pub const REQUIRED_COLUMNS: [&str; 5] = [COL_TAX_ID, COL_SUPPLIER, COL_REF, COL_DATE, COL_CUFE];

/// Header row of the `IMPORT` sheet.
pub const IMPORT_HEADERS: [&str; 8] = [
    "journal_id",
    "partner_id",
    "ref",
    "invoice_date",
    "invoice_line_ids/product_id",
    "invoice_line_ids/price_unit",
    "invoice_line_ids/tax_ids",
    "cufe_cuds_other_system",
];

// =============================================================================
// Cell values
// =============================================================================

/// A single worksheet cell.
///
/// Native spreadsheet dates are resolved against the workbook's date epoch
/// when the sheet is read, so `DateTime` never needs the epoch again.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    /// Formula error such as `#N/A`.
    Error(String),
}

impl CellValue {
    /// Emptiness as the input sheets are written: blank cells, whitespace,
    /// `"0"`, numeric zero and `false` all count as "no value".
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => {
                let s = s.trim();
                s.is_empty() || s == "0"
            }
            CellValue::Number(n) => *n == 0.0,
            CellValue::Bool(b) => !b,
            CellValue::DateTime(_) | CellValue::Error(_) => false,
        }
    }

    /// Human-readable text of the cell (empty string for `Empty`).
    pub fn display_text(&self) -> String {
        self.to_string()
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => {
                // Whole amounts print without a trailing ".0"
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::DateTime(dt) => write!(f, "{}", format_datetime(dt)),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

/// Preview rows go to the browser as plain JSON scalars.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_none(),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            CellValue::Bool(b) => serializer.serialize_bool(*b),
            CellValue::DateTime(dt) => serializer.serialize_str(&format_datetime(dt)),
            CellValue::Error(e) => serializer.serialize_str(e),
        }
    }
}

/// `YYYY-MM-DD` for midnight values, `YYYY-MM-DD HH:MM:SS` otherwise.
fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.time() == chrono::NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

// =============================================================================
// Item types
// =============================================================================

/// Purchase line-item category, one column per category in the input sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ItemType {
    /// 19% VAT
    Vat19,
    /// Excluded from VAT
    Excluded,
    /// 5% VAT
    Vat5,
    /// Consumption tax
    Consumption,
    /// Ultra-processed beverages tax
    Ibua,
    /// Ultra-processed food tax
    Icui,
    /// Anything else
    Other,
}

impl ItemType {
    /// Every item type, in the order output rows are emitted.
    pub const ALL: [ItemType; 7] = [
        ItemType::Vat19,
        ItemType::Excluded,
        ItemType::Vat5,
        ItemType::Consumption,
        ItemType::Ibua,
        ItemType::Icui,
        ItemType::Other,
    ];

    /// Column label in the input sheet, also used as the product code.
    pub fn label(&self) -> &'static str {
        match self {
            ItemType::Vat19 => "ITEM 19%",
            ItemType::Excluded => "ITEM EXCL",
            ItemType::Vat5 => "ITEM 5%",
            ItemType::Consumption => "ITEM IC",
            ItemType::Ibua => "ITEM IBUA",
            ItemType::Icui => "ITEM ICUI",
            ItemType::Other => "ITEM OTRO",
        }
    }

    /// Comma-joined tax codes applied to this item type on import.
    pub fn tax_codes(&self) -> &'static str {
        match self {
            ItemType::Vat19 => "19% IVA Compras,2.5% RteFte Comp Dec",
            ItemType::Excluded => "0% Excluido Compras,2.5% RteFte Comp Dec",
            ItemType::Vat5 => "5% IVA Compras,2.5% RteFte Comp Dec",
            ItemType::Consumption
            | ItemType::Ibua
            | ItemType::Icui
            | ItemType::Other => "0% Excluido Compras",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|t| t.label() == label)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Output rows
// =============================================================================

/// Fields describing the parent invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceIdentity {
    pub journal: CellValue,
    pub partner: CellValue,
    pub reference: CellValue,
    pub invoice_date: CellValue,
    pub cufe: CellValue,
}

/// One row of the `IMPORT` sheet.
///
/// `identity` is only set on the first row of each invoice; the accounting
/// import groups the following blank-identity rows under it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub identity: Option<InvoiceIdentity>,
    pub item: ItemType,
    pub price: CellValue,
}

impl OutputRow {
    pub fn is_invoice_start(&self) -> bool {
        self.identity.is_some()
    }

    /// Cells in `IMPORT_HEADERS` order.
    pub fn to_cells(&self) -> Vec<CellValue> {
        let (journal, partner, reference, date, cufe) = match &self.identity {
            Some(id) => (
                id.journal.clone(),
                id.partner.clone(),
                id.reference.clone(),
                id.invoice_date.clone(),
                id.cufe.clone(),
            ),
            None => Default::default(),
        };

        vec![
            journal,
            partner,
            reference,
            date,
            CellValue::from(self.item.label()),
            self.price.clone(),
            CellValue::from(self.item.tax_codes()),
            cufe,
        ]
    }
}

/// The synthetic header row written first to the `IMPORT` sheet.
pub fn import_header_row() -> Vec<CellValue> {
    IMPORT_HEADERS.iter().map(|h| CellValue::from(*h)).collect()
}

// =============================================================================
// Statistics
// =============================================================================

/// Statistics handed back to the caller after a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    /// Invoices that produced at least one output row
    pub invoice_count: usize,
    /// Output rows, header excluded
    pub rows_generated: usize,
    /// Wall-clock seconds from opening the input to persisting the output
    pub processing_time: f64,
}

/// An invoice whose date could not be normalized and was passed through.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWarning {
    /// 1-based worksheet row
    pub row: usize,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_blank_cells() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::from("").is_blank());
        assert!(CellValue::from("   ").is_blank());
        assert!(CellValue::from("0").is_blank());
        assert!(CellValue::Number(0.0).is_blank());
        assert!(CellValue::Bool(false).is_blank());

        assert!(!CellValue::from("900123456").is_blank());
        assert!(!CellValue::Number(0.5).is_blank());
        assert!(!CellValue::Error("#N/A".into()).is_blank());
    }

    #[test]
    fn test_item_type_order_and_taxes() {
        let labels: Vec<&str> = ItemType::ALL.iter().map(|t| t.label()).collect();
        assert_eq!(
            labels,
            vec!["ITEM 19%", "ITEM EXCL", "ITEM 5%", "ITEM IC", "ITEM IBUA", "ITEM ICUI", "ITEM OTRO"]
        );
        assert_eq!(ItemType::Vat19.tax_codes(), "19% IVA Compras,2.5% RteFte Comp Dec");
        assert_eq!(ItemType::Icui.tax_codes(), "0% Excluido Compras");
        assert_eq!(ItemType::from_label(" ITEM 5% "), Some(ItemType::Vat5));
        assert_eq!(ItemType::from_label("ITEM 8%"), None);
    }

    #[test]
    fn test_continuation_row_cells() {
        let row = OutputRow {
            identity: None,
            item: ItemType::Excluded,
            price: CellValue::Number(50000.0),
        };
        let cells = row.to_cells();
        assert_eq!(cells.len(), IMPORT_HEADERS.len());
        assert!(cells[..4].iter().all(|c| *c == CellValue::Empty));
        assert_eq!(cells[4], CellValue::from("ITEM EXCL"));
        assert_eq!(cells[6], CellValue::from("0% Excluido Compras,2.5% RteFte Comp Dec"));
        assert_eq!(cells[7], CellValue::Empty);
    }

    #[test]
    fn test_cell_serialization() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let row = vec![
            CellValue::Empty,
            CellValue::Number(100000.0),
            CellValue::Number(12.5),
            CellValue::DateTime(date),
            CellValue::from("ACME SAS"),
        ];
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!([null, 100000, 12.5, "2024-03-15", "ACME SAS"])
        );
    }
}
