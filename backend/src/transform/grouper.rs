//! Group raw schedule rows into products.
//!
//! Schedules spread one product over several rows: the first row carries the
//! doc code, the following ones add brand, description or notes. Every row
//! with a doc code opens a new group.
//!
//! ```text
//! Raw rows                          →  Products
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │ F64  │ Study Chair │ 600     │      │ F64 │ Study Chair\nOak │ 600 │
//! │      │ Oak         │         │  →   ├──────────────────────────────┤
//! │ F65  │ Desk        │ 1200    │      │ F65 │ Desk             │ 1200│
//! └──────────────────────────────┘      └──────────────────────────────┘
//! ```
//!
//! Text columns are joined line by line, numeric columns keep their first
//! value, and columns with no canonical field are folded into
//! `product_details` as `"<header>: <value>"` lines.

use crate::error::SheetError;
use crate::grid::{Cell, RawGrid};
use crate::models::{CanonicalField, HeaderMapping};

use super::header::make_unique;

/// Data region of a sheet: unique header labels plus non-empty rows below them.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl DataTable {
    /// Take the rows after `header_index`, dropping rows with no data at all.
    pub fn from_grid(grid: &RawGrid, header_index: usize) -> Self {
        let headers = grid
            .row(header_index)
            .map(make_unique)
            .unwrap_or_default();
        let rows = grid
            .rows()
            .iter()
            .skip(header_index + 1)
            .filter(|row| row.iter().any(|c| !c.is_missing()))
            .cloned()
            .collect();
        Self { headers, rows }
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// A column is text when any of its cells holds text; otherwise numeric.
    fn is_text_column(&self, col: usize) -> bool {
        self.rows
            .iter()
            .any(|row| matches!(row.get(col), Some(Cell::Text(_))))
    }
}

/// One aggregated product, one cell per canonical field.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    cells: Vec<Cell>,
}

impl Default for ProductRow {
    fn default() -> Self {
        Self {
            cells: vec![Cell::Missing; CanonicalField::ALL.len()],
        }
    }
}

impl ProductRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: CanonicalField) -> &Cell {
        &self.cells[field as usize]
    }

    pub fn set(&mut self, field: CanonicalField, cell: Cell) {
        self.cells[field as usize] = cell;
    }

    /// Trimmed string form of a field, empty when missing.
    pub fn text(&self, field: CanonicalField) -> String {
        self.get(field).display().trim().to_string()
    }
}

/// Group id per row: the running count of doc-code cells, minus one.
///
/// Rows before the first doc code belong to group 0 together with it.
pub fn assign_groups(rows: &[Vec<Cell>], key_col: usize) -> Vec<usize> {
    let mut seen = 0usize;
    rows.iter()
        .map(|row| {
            if row.get(key_col).is_some_and(|c| !c.is_missing()) {
                seen += 1;
            }
            seen.saturating_sub(1)
        })
        .collect()
}

/// Collapse the data rows into one [`ProductRow`] per group, in sheet order.
pub fn aggregate(table: &DataTable, mapping: &HeaderMapping) -> Result<Vec<ProductRow>, SheetError> {
    let key_col = mapping
        .get(CanonicalField::DocCode)
        .and_then(|h| table.column_index(h))
        .ok_or(SheetError::GroupingKeyMissing)?;

    if table.rows.is_empty() {
        return Ok(Vec::new());
    }

    let group_ids = assign_groups(&table.rows, key_col);
    let group_count = group_ids.last().map_or(0, |g| g + 1);
    let mut groups: Vec<Vec<&[Cell]>> = vec![Vec::new(); group_count];
    for (row, gid) in table.rows.iter().zip(&group_ids) {
        groups[*gid].push(row.as_slice());
    }

    let text_columns: Vec<bool> = (0..table.headers.len())
        .map(|col| table.is_text_column(col))
        .collect();

    let products = groups
        .iter()
        .map(|rows| {
            let merged: Vec<Cell> = (0..table.headers.len())
                .map(|col| collapse_column(rows, col, text_columns[col]))
                .collect();
            build_product(table, mapping, &merged)
        })
        .collect();

    Ok(products)
}

/// Collapse one column of a group into a single cell.
fn collapse_column(rows: &[&[Cell]], col: usize, is_text: bool) -> Cell {
    let mut values = rows
        .iter()
        .filter_map(|row| row.get(col))
        .filter(|c| !c.is_missing());

    if is_text {
        let joined = values
            .filter_map(Cell::to_text)
            .map(|s| s.trim().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Cell::text(joined.trim())
    } else {
        values.next().cloned().unwrap_or_default()
    }
}

fn build_product(table: &DataTable, mapping: &HeaderMapping, merged: &[Cell]) -> ProductRow {
    let mut product = ProductRow::new();
    let mut folded = Vec::new();

    for (col, header) in table.headers.iter().enumerate() {
        let cell = &merged[col];
        match mapping.field_for_header(header) {
            Some(field) => product.set(field, cell.clone()),
            None => {
                if !cell.is_blank() {
                    folded.push(format!("{}: {}", header, cell.display().trim()));
                }
            }
        }
    }

    if !folded.is_empty() {
        let existing = product.text(CanonicalField::ProductDetails);
        let details = if existing.is_empty() {
            folded.join("\n")
        } else {
            format!("{}\n{}", existing, folded.join("\n"))
        };
        product.set(CanonicalField::ProductDetails, Cell::Text(details));
    }

    product
}
