//! Raw grids: sheets loaded as cells with no header row assumed.
//!
//! Workbooks (`.xlsx`, `.xls`, `.xlsb`, `.ods`) are decoded with calamine,
//! one grid per sheet. CSV files become a single sheet, with encoding and
//! delimiter auto-detection. Nothing here knows about products.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;

use crate::error::GridError;

// =============================================================================
// Cells
// =============================================================================

/// A single spreadsheet value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Missing,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Text cell, or `Missing` when the text is blank.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            Cell::Missing
        } else {
            Cell::Text(s)
        }
    }

    /// Convert a JSON scalar. Booleans become text, arrays and objects are missing.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Cell::text(s.as_str()),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            Value::Bool(b) => Cell::Text(b.to_string()),
            _ => Cell::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Number(n) => n.is_nan(),
            Cell::Text(_) => false,
        }
    }

    /// Missing, or text that is only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Text(s) => s.trim().is_empty(),
            other => other.is_missing(),
        }
    }

    /// String form of the value, `None` when missing.
    pub fn to_text(&self) -> Option<String> {
        match self {
            _ if self.is_missing() => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Missing => None,
        }
    }

    /// String form of the value, empty when missing.
    pub fn display(&self) -> String {
        self.to_text().unwrap_or_default()
    }
}

/// Render a number the way a spreadsheet shows it: whole numbers without `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Missing,
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::String(s) => Cell::text(s.as_str()),
            other => Cell::text(other.to_string()),
        }
    }
}

// =============================================================================
// Raw Grid
// =============================================================================

/// Immutable row-major grid. Every row has the same width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGrid {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl RawGrid {
    /// Build a grid, padding short rows with missing cells.
    pub fn new(mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, Cell::Missing);
        }
        Self { rows, width }
    }

    /// Build a grid from a JSON array of arrays of scalars.
    ///
    /// ```ignore
    /// let grid = RawGrid::from_json(&json!([[null, "Code"], ["F64", 600]]));
    /// assert_eq!(grid.height(), 2);
    /// ```
    pub fn from_json(value: &Value) -> Self {
        let rows = value
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(Cell::from_json).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self::new(rows)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.width == 0
    }

    /// Fraction of non-missing cells in a row (0.0 for out-of-range rows).
    pub fn row_completeness(&self, index: usize) -> f64 {
        match self.row(index) {
            Some(row) if self.width > 0 => {
                let filled = row.iter().filter(|c| !c.is_missing()).count();
                filled as f64 / self.width as f64
            }
            _ => 0.0,
        }
    }
}

/// One named sheet of a workbook.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub grid: RawGrid,
}

// =============================================================================
// Loading
// =============================================================================

const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xls", "xlsb", "ods"];

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Whether a file name has an extension we can turn into grids.
pub fn is_supported_file(file_name: &str) -> bool {
    let ext = extension_of(file_name);
    ext == "csv" || WORKBOOK_EXTENSIONS.contains(&ext.as_str())
}

/// Load every sheet of a file on disk.
pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Vec<Sheet>, GridError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    load_bytes(&bytes, file_name)
}

/// Load every sheet from uploaded bytes, dispatching on the file extension.
pub fn load_bytes(bytes: &[u8], file_name: &str) -> Result<Vec<Sheet>, GridError> {
    let ext = extension_of(file_name);
    match ext.as_str() {
        "csv" => {
            let stem = Path::new(file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .unwrap_or("Sheet1");
            Ok(vec![Sheet {
                name: stem.to_string(),
                grid: load_csv(bytes)?,
            }])
        }
        e if WORKBOOK_EXTENSIONS.contains(&e) => load_workbook(bytes),
        _ => Err(GridError::UnsupportedFormat(if ext.is_empty() {
            file_name.to_string()
        } else {
            ext
        })),
    }
}

/// Decode a workbook, one grid per sheet, in workbook order.
pub fn load_workbook(bytes: &[u8]) -> Result<Vec<Sheet>, GridError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| GridError::Workbook(e.to_string()))?;

    let names = workbook.sheet_names();
    if names.is_empty() {
        return Err(GridError::EmptyWorkbook);
    }

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| GridError::Workbook(format!("sheet '{}': {}", name, e)))?;
        sheets.push(Sheet {
            name,
            grid: grid_from_range(&range),
        });
    }
    Ok(sheets)
}

/// Grid for a sheet range, anchored at A1.
///
/// calamine ranges start at the first used cell, so leading blank rows and
/// columns are put back as missing cells.
fn grid_from_range(range: &Range<Data>) -> RawGrid {
    let Some((start_row, start_col)) = range.start() else {
        return RawGrid::default();
    };

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![Cell::Missing; start_col as usize];
        cells.extend(row.iter().map(Cell::from));
        rows.push(cells);
    }
    RawGrid::new(rows)
}

/// Decode CSV bytes into a grid. No row is treated as a header.
pub fn load_csv(bytes: &[u8]) -> Result<RawGrid, GridError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| GridError::Csv(e.to_string()))?;
        rows.push(record.iter().map(csv_cell).collect());
    }
    Ok(RawGrid::new(rows))
}

fn csv_cell(raw: &str) -> Cell {
    let s = raw.trim();
    if s.is_empty() {
        return Cell::Missing;
    }
    let looks_numeric = s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes().all(|b| b.is_ascii_digit() || b"+-.eE".contains(&b));
    match s.parse::<f64>() {
        Ok(n) if looks_numeric && n.is_finite() => Cell::Number(n),
        _ => Cell::Text(s.to_string()),
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string, falling back to lossy UTF-8
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first non-empty line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_cell_text_blank_is_missing() {
        assert_eq!(Cell::text("  "), Cell::Missing);
        assert_eq!(Cell::text("F64"), Cell::Text("F64".into()));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(Cell::Number(600.0).display(), "600");
        assert_eq!(Cell::Number(299.99).display(), "299.99");
        assert_eq!(Cell::Number(f64::NAN).display(), "");
        assert!(Cell::Number(f64::NAN).is_missing());
    }

    #[test]
    fn test_grid_is_padded() {
        let grid = RawGrid::from_json(&json!([["a"], ["b", "c", null]]));
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.row(0).unwrap().len(), 3);
        assert_eq!(grid.row(0).unwrap()[2], Cell::Missing);
    }

    #[test]
    fn test_row_completeness() {
        let grid = RawGrid::from_json(&json!([
            [null, null, null],
            ["H1", "H2", null],
        ]));
        assert_eq!(grid.row_completeness(0), 0.0);
        assert!((grid.row_completeness(1) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(grid.row_completeness(7), 0.0);
    }

    #[test]
    fn test_csv_has_no_assumed_header() {
        let csv = "Project schedule,,\ndoc_code,product_name,width\nF64,Chair,600\n";
        let grid = load_csv(csv.as_bytes()).unwrap();
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.row(0).unwrap()[0], Cell::Text("Project schedule".into()));
        assert_eq!(grid.row(0).unwrap()[1], Cell::Missing);
        assert_eq!(grid.row(2).unwrap()[2], Cell::Number(600.0));
    }

    #[test]
    fn test_csv_numeric_detection() {
        assert_eq!(csv_cell("299.99"), Cell::Number(299.99));
        assert_eq!(csv_cell("$299.99"), Cell::Text("$299.99".into()));
        assert_eq!(csv_cell("nan"), Cell::Text("nan".into()));
        assert_eq!(csv_cell("1.5 m"), Cell::Text("1.5 m".into()));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("\na\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_cell_from_workbook_data() {
        assert_eq!(Cell::from(&Data::Empty), Cell::Missing);
        assert_eq!(
            Cell::from(&Data::Error(calamine::CellErrorType::Div0)),
            Cell::Missing
        );
        assert_eq!(Cell::from(&Data::Float(299.99)), Cell::Number(299.99));
        assert_eq!(Cell::from(&Data::Int(600)), Cell::Number(600.0));
        assert_eq!(Cell::from(&Data::String("Oak".into())), Cell::Text("Oak".into()));
        assert_eq!(Cell::from(&Data::String("   ".into())), Cell::Missing);
        assert_eq!(Cell::from(&Data::Bool(true)), Cell::Text("true".into()));
        assert_eq!(
            Cell::from(&Data::DateTimeIso("2024-03-01T00:00:00".into())),
            Cell::Text("2024-03-01T00:00:00".into())
        );
    }

    #[test]
    fn test_range_offset_is_kept() {
        let mut range = Range::new((2, 2), (3, 3));
        range.set_value((2, 2), Data::String("Code".into()));
        range.set_value((2, 3), Data::String("Width".into()));
        range.set_value((3, 2), Data::String("F1".into()));
        range.set_value((3, 3), Data::Float(600.0));

        let grid = grid_from_range(&range);

        assert_eq!(grid.height(), 4);
        assert_eq!(grid.width(), 4);
        assert!(grid.row(0).unwrap().iter().all(Cell::is_missing));
        assert_eq!(
            grid.row(2).unwrap(),
            &[
                Cell::Missing,
                Cell::Missing,
                Cell::Text("Code".into()),
                Cell::Text("Width".into())
            ]
        );
        assert_eq!(grid.row(3).unwrap()[3], Cell::Number(600.0));
        assert_eq!(grid_from_range(&Range::empty()), RawGrid::default());
    }

    #[test]
    fn test_xlsx_keeps_leading_blank_rows_and_columns() {
        use crate::transform::header::find_header_row;
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let joinery = workbook.add_worksheet();
        joinery.set_name("Joinery").unwrap();
        joinery.write_string(2, 2, "Code").unwrap();
        joinery.write_string(2, 3, "Product").unwrap();
        joinery.write_string(2, 4, "Width").unwrap();
        joinery.write_string(3, 2, "F64").unwrap();
        joinery.write_string(3, 3, "Study Chair").unwrap();
        joinery.write_number(3, 4, 600.0).unwrap();
        let lighting = workbook.add_worksheet();
        lighting.set_name("Lighting").unwrap();
        lighting.write_string(0, 0, "Ref").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let sheets = load_bytes(&bytes, "schedule.xlsx").unwrap();

        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "Joinery");
        assert_eq!(sheets[1].name, "Lighting");

        let grid = &sheets[0].grid;
        assert_eq!(grid.width(), 5);
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.row(2).unwrap()[2], Cell::Text("Code".into()));
        assert_eq!(grid.row(3).unwrap()[4], Cell::Number(600.0));

        // 3 of 5 cells filled: below the default threshold
        assert!((grid.row_completeness(2) - 0.6).abs() < 1e-9);
        assert!(find_header_row(grid, 0.7).is_none());
        assert_eq!(find_header_row(grid, 0.6).map(|h| h.index), Some(2));
    }

    #[test]
    fn test_supported_files() {
        assert!(is_supported_file("schedule.xlsx"));
        assert!(is_supported_file("SCHEDULE.XLS"));
        assert!(is_supported_file("export.csv"));
        assert!(!is_supported_file("notes.txt"));
        assert!(!is_supported_file("noext"));
    }

    #[test]
    fn test_load_bytes_rejects_unknown_extension() {
        let err = load_bytes(b"not excel", "test.txt").unwrap_err();
        assert!(matches!(err, GridError::UnsupportedFormat(ref e) if e == "txt"));
    }

    #[test]
    fn test_load_csv_path_uses_file_stem() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "doc_code,product_name").unwrap();
        writeln!(file, "F64,Chair").unwrap();

        let sheets = load_path(file.path()).unwrap();
        assert_eq!(sheets.len(), 1);
        let stem = file.path().file_stem().unwrap().to_str().unwrap();
        assert_eq!(sheets[0].name, stem);
        assert_eq!(sheets[0].grid.height(), 2);
    }

    #[test]
    fn test_invalid_workbook_bytes() {
        let err = load_bytes(b"definitely not a zip", "broken.xlsx").unwrap_err();
        assert!(matches!(err, GridError::Workbook(_)));
    }
}
