//! Column-to-row conversion.
//!
//! Expands each invoice row of the `COLUMNA` sheet into one output row per
//! populated item-type column. Only the first output row of an invoice
//! carries the invoice fields (journal, partner, ref, date, CUFE); the rows
//! after it leave them blank so the accounting import attaches them to the
//! same invoice.

use crate::ingest::ValidatedSheet;
use crate::models::{
    import_header_row, CellValue, DateWarning, InvoiceIdentity, ItemType, OutputRow, COL_CUFE,
    COL_DATE, COL_REF, COL_SUPPLIER, COL_TAX_ID, JOURNAL,
};

use super::dates::format_date;

/// Result of converting a validated sheet
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    /// Output rows in emission order (header not included)
    pub rows: Vec<OutputRow>,
    /// Invoices that produced at least one row
    pub invoice_count: usize,
    /// Invoices whose date was passed through (only with `report_dates`)
    pub date_warnings: Vec<DateWarning>,
}

impl Conversion {
    pub fn rows_generated(&self) -> usize {
        self.rows.len()
    }

    /// Full `IMPORT` grid: header row first, then every output row.
    pub fn to_grid(&self) -> Vec<Vec<CellValue>> {
        std::iter::once(import_header_row())
            .chain(self.rows.iter().map(OutputRow::to_cells))
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} invoices, {} rows generated, {} date warnings",
            self.invoice_count,
            self.rows.len(),
            self.date_warnings.len()
        )
    }
}

/// Convert every data row of the sheet.
///
/// A row is an invoice only when its `NIT` cell is filled; other rows are
/// skipped whatever else they hold. Item types are visited in
/// [`ItemType::ALL`] order, never in input column order, so the output is
/// independent of how the columns were arranged.
pub fn convert_rows(sheet: &ValidatedSheet, report_dates: bool) -> Conversion {
    let mut conversion = Conversion::default();

    // Item columns actually present, resolved once
    let item_columns: Vec<(ItemType, usize)> = ItemType::ALL
        .into_iter()
        .filter_map(|t| sheet.headers.position(t.label()).map(|col| (t, col)))
        .collect();

    for (index, row) in sheet.data_rows() {
        if sheet.cell(row, COL_TAX_ID).is_blank() {
            continue;
        }

        let date = format_date(sheet.cell(row, COL_DATE));
        let date_unparsed = date.is_passthrough();

        let mut identity = Some(InvoiceIdentity {
            journal: CellValue::from(JOURNAL),
            partner: sheet.cell(row, COL_SUPPLIER).clone(),
            reference: sheet.cell(row, COL_REF).clone(),
            invoice_date: date.into_cell(),
            cufe: sheet.cell(row, COL_CUFE).clone(),
        });

        let mut emitted = 0;
        for &(item, col) in &item_columns {
            let Some(price) = row.get(col).filter(|c| !c.is_blank()) else {
                continue;
            };

            conversion.rows.push(OutputRow {
                identity: identity.take(),
                item,
                price: price.clone(),
            });
            emitted += 1;
        }

        if emitted > 0 {
            conversion.invoice_count += 1;

            if report_dates && date_unparsed {
                conversion.date_warnings.push(DateWarning {
                    row: sheet.grid.sheet_row_number(index),
                    value: sheet.cell(row, COL_DATE).display_text(),
                });
            }
        }
    }

    conversion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{validate_grid, RawGrid};
    use crate::models::IMPORT_HEADERS;

    const HEADER: [&str; 7] = ["NIT", "Proveedor", "CONSECUTIVO", "Fecha", "CUFE", "ITEM 19%", "ITEM EXCL"];

    fn header() -> Vec<CellValue> {
        HEADER.iter().map(|h| CellValue::from(*h)).collect()
    }

    fn invoice(nit: &str, supplier: &str, reference: &str, date: &str, cufe: &str, vat19: f64, excl: f64) -> Vec<CellValue> {
        let text = |s: &str| if s.is_empty() { CellValue::Empty } else { CellValue::from(s) };
        let amount = |n: f64| if n == 0.0 { CellValue::Empty } else { CellValue::Number(n) };
        vec![text(nit), text(supplier), text(reference), text(date), text(cufe), amount(vat19), amount(excl)]
    }

    fn convert(rows: Vec<Vec<CellValue>>) -> Conversion {
        let mut grid = vec![header()];
        grid.extend(rows);
        let sheet = validate_grid(RawGrid::from_rows(grid)).unwrap();
        convert_rows(&sheet, false)
    }

    #[test]
    fn test_single_invoice_two_items() {
        let result = convert(vec![invoice("900123456", "ACME SAS", "FE-001", "15-03-2024", "abcd1234", 100000.0, 50000.0)]);

        assert_eq!(result.invoice_count, 1);
        assert_eq!(result.rows_generated(), 2);

        let grid = result.to_grid();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0], IMPORT_HEADERS.iter().map(|h| CellValue::from(*h)).collect::<Vec<_>>());
        assert_eq!(
            grid[1],
            vec![
                CellValue::from("Facturas de Proveedores"),
                CellValue::from("ACME SAS"),
                CellValue::from("FE-001"),
                CellValue::from("2024-03-15"),
                CellValue::from("ITEM 19%"),
                CellValue::Number(100000.0),
                CellValue::from("19% IVA Compras,2.5% RteFte Comp Dec"),
                CellValue::from("abcd1234"),
            ]
        );
        assert_eq!(
            grid[2],
            vec![
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty,
                CellValue::from("ITEM EXCL"),
                CellValue::Number(50000.0),
                CellValue::from("0% Excluido Compras,2.5% RteFte Comp Dec"),
                CellValue::Empty,
            ]
        );
    }

    #[test]
    fn test_item_order_ignores_column_order() {
        let labels = ["ITEM OTRO", "ITEM EXCL", "NIT", "Proveedor", "CONSECUTIVO", "Fecha", "CUFE", "ITEM 19%"];
        let grid = vec![
            labels.iter().map(|h| CellValue::from(*h)).collect(),
            vec![
                CellValue::Number(7.0),
                CellValue::Number(50000.0),
                CellValue::from("900123456"),
                CellValue::from("ACME SAS"),
                CellValue::from("FE-001"),
                CellValue::from("15-03-2024"),
                CellValue::from("abcd1234"),
                CellValue::Number(100000.0),
            ],
        ];
        let sheet = validate_grid(RawGrid::from_rows(grid)).unwrap();
        let result = convert_rows(&sheet, false);

        let items: Vec<ItemType> = result.rows.iter().map(|r| r.item).collect();
        assert_eq!(items, vec![ItemType::Vat19, ItemType::Excluded, ItemType::Other]);
        assert!(result.rows[0].is_invoice_start());
    }

    #[test]
    fn test_blank_nit_skipped() {
        let result = convert(vec![
            invoice("", "ACME SAS", "FE-001", "15-03-2024", "abcd1234", 100000.0, 50000.0),
            invoice("0", "ACME SAS", "FE-002", "15-03-2024", "abcd1235", 100000.0, 0.0),
        ]);
        assert_eq!(result.invoice_count, 0);
        assert_eq!(result.rows_generated(), 0);
        assert_eq!(result.to_grid().len(), 1);
    }

    #[test]
    fn test_invoice_without_items_not_counted() {
        let result = convert(vec![
            invoice("900123456", "ACME SAS", "FE-001", "15-03-2024", "abcd1234", 0.0, 0.0),
            invoice("800999111", "BETA LTDA", "FE-900", "01-02-2024", "ffff", 0.0, 1200.0),
        ]);
        assert_eq!(result.invoice_count, 1);
        assert_eq!(result.rows_generated(), 1);
        let identity = result.rows[0].identity.as_ref().unwrap();
        assert_eq!(identity.partner, CellValue::from("BETA LTDA"));
        assert_eq!(identity.invoice_date, CellValue::from("2024-02-01"));
    }

    #[test]
    fn test_exactly_one_identity_row_per_invoice() {
        let result = convert(vec![
            invoice("1", "A", "R1", "01-01-2024", "c1", 10.0, 20.0),
            invoice("2", "B", "R2", "02-01-2024", "c2", 30.0, 0.0),
            invoice("3", "C", "R3", "03-01-2024", "c3", 40.0, 50.0),
        ]);

        assert_eq!(result.invoice_count, 3);
        assert_eq!(result.rows_generated(), 5);
        let starts: Vec<bool> = result.rows.iter().map(OutputRow::is_invoice_start).collect();
        assert_eq!(starts, vec![true, false, true, true, false]);
    }

    #[test]
    fn test_missing_item_columns_are_ignored() {
        let grid = vec![
            ["NIT", "Proveedor", "CONSECUTIVO", "Fecha", "CUFE", "ITEM OTRO"]
                .iter()
                .map(|h| CellValue::from(*h))
                .collect(),
            vec![
                CellValue::from("900"),
                CellValue::from("X"),
                CellValue::from("R"),
                CellValue::Number(45366.0),
                CellValue::from("c"),
                CellValue::from("abc"),
            ],
        ];
        let sheet = validate_grid(RawGrid::from_rows(grid)).unwrap();
        let result = convert_rows(&sheet, false);

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].item, ItemType::Other);
        // Raw value kept even when it is not numeric
        assert_eq!(result.rows[0].price, CellValue::from("abc"));
        assert_eq!(
            result.rows[0].identity.as_ref().unwrap().invoice_date,
            CellValue::from("2024-03-15")
        );
    }

    #[test]
    fn test_date_warnings_only_when_reporting() {
        let rows = vec![
            invoice("900", "A", "R1", "pendiente", "c1", 10.0, 0.0),
            invoice("901", "B", "R2", "15-03-2024", "c2", 10.0, 0.0),
        ];

        let mut grid = vec![header()];
        grid.extend(rows);
        let sheet = validate_grid(RawGrid::from_rows(grid)).unwrap();

        let silent = convert_rows(&sheet, false);
        let strict = convert_rows(&sheet, true);

        assert!(silent.date_warnings.is_empty());
        assert_eq!(strict.date_warnings, vec![DateWarning { row: 2, value: "pendiente".into() }]);
        assert_eq!(silent.to_grid(), strict.to_grid());
        assert_eq!(
            strict.rows[0].identity.as_ref().unwrap().invoice_date,
            CellValue::from("pendiente")
        );
    }

    #[test]
    fn test_deterministic() {
        let rows = vec![
            invoice("1", "A", "R1", "01-01-2024", "c1", 10.0, 20.0),
            invoice("2", "B", "R2", "02-01-2024", "c2", 30.0, 0.0),
        ];
        assert_eq!(convert(rows.clone()).to_grid(), convert(rows).to_grid());
    }
}
