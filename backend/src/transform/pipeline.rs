//! High-level pipeline API: raw sheet grids to validated product schedules.
//!
//! Per sheet the steps run in a fixed order:
//!
//! 1. Find the header row ([`find_header_row`])
//! 2. Map headers to canonical fields (aliases, then the optional matcher)
//! 3. Group continuation rows into products ([`aggregate`])
//! 4. Enrich product text with the optional extractor
//! 5. Normalize values, drop non-products, validate every record
//!
//! Only a missing header row or a missing `doc_code` column abort a sheet,
//! and even then the sheet yields an empty schedule with a warning. Other
//! sheets are never affected.
//!
//! # Example
//!
//! ```rust,ignore
//! use schedule_parser::ai::AiServices;
//! use schedule_parser::config::ParserOptions;
//! use schedule_parser::transform::extract_from_path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schedules = extract_from_path(
//!         "schedule.xlsx",
//!         &AiServices::none(),
//!         &ParserOptions::default(),
//!     ).await?;
//!
//!     for schedule in &schedules {
//!         println!("{}: {} products", schedule.schedule_name, schedule.products.len());
//!     }
//!     Ok(())
//! }
//! ```

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;

use super::enrich::enrich_products;
use super::filter::is_meaningful;
use super::grouper::{aggregate, DataTable};
use super::header::{apply_supplement, find_header_row, HeaderMapper};
use super::normalize::normalize_products;
use crate::ai::AiServices;
use crate::api::logs::{
    log_info, log_info_indent, log_success, log_success_indent, log_warning_indent,
};
use crate::config::ParserOptions;
use crate::error::{PipelineResult, RecordError, SheetError};
use crate::grid::{load_bytes, load_path, RawGrid, Sheet};
use crate::models::{CanonicalField, HeaderMapping, ProductRecord, ProductSchedule};
use crate::validation::validate_product;

// =============================================================================
// Per-sheet extraction
// =============================================================================

/// Extract the products of one sheet.
///
/// Never fails: sheet-level problems come back as warnings on an empty
/// schedule.
pub async fn extract_products_from_sheet(
    grid: &RawGrid,
    sheet_name: &str,
    services: &AiServices,
    options: &ParserOptions,
) -> ProductSchedule {
    log_info(format!("📄 Sheet \"{}\"", sheet_name));
    let mut schedule = ProductSchedule::new(sheet_name);

    match run_sheet(grid, services, options, &mut schedule.warnings).await {
        Ok(products) => {
            log_success_indent(format!("{} products extracted", products.len()), 1);
            schedule.products = products;
        }
        Err(e) => {
            log_warning_indent(format!("Skipping sheet: {}", e), 1);
            schedule.warnings.push(e.to_string());
        }
    }

    schedule
}

async fn run_sheet(
    grid: &RawGrid,
    services: &AiServices,
    options: &ParserOptions,
    warnings: &mut Vec<String>,
) -> Result<Vec<ProductRecord>, SheetError> {
    let header = find_header_row(grid, options.header_threshold).ok_or(
        SheetError::HeaderNotFound {
            threshold: options.header_threshold,
        },
    )?;
    log_success_indent(
        format!(
            "Header row {} ({:.0}% filled)",
            header.index,
            header.density * 100.0
        ),
        1,
    );

    let table = DataTable::from_grid(grid, header.index);
    let mapping = resolve_mapping(&table.headers, services, options, warnings).await;

    let mut products = aggregate(&table, &mapping)?;
    log_info_indent(
        format!("{} data rows grouped into {} products", table.rows.len(), products.len()),
        1,
    );

    if options.enrich_products {
        if let Some(extractor) = &services.extractor {
            let failures =
                enrich_products(&mut products, extractor.as_ref(), options.max_concurrency).await;
            warnings.extend(failures);
        }
    }

    let rows = normalize_products(&products);
    let total = rows.len();
    let rows: Vec<Map<String, Value>> = rows.into_iter().filter(|r| is_meaningful(r)).collect();
    if rows.len() < total {
        log_info_indent(format!("Filtered out {} non-product rows", total - rows.len()), 1);
    }

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match validate_record(row) {
            Ok(record) => records.push(record),
            Err(e) => {
                log_warning_indent(e.to_string(), 1);
                warnings.push(e.to_string());
            }
        }
    }

    Ok(records)
}

/// Heuristic mapping, supplemented by the header matcher when enabled.
pub async fn resolve_mapping(
    headers: &[String],
    services: &AiServices,
    options: &ParserOptions,
    warnings: &mut Vec<String>,
) -> HeaderMapping {
    let mut mapping = HeaderMapper::new(&options.aliases).map(headers);
    log_info_indent(format!("Heuristic mapping: matched {} fields", mapping.len()), 1);

    if options.ai_header_mapping && mapping.len() < CanonicalField::ALL.len() {
        if let Some(matcher) = &services.header_matcher {
            match matcher.map_headers(headers).await {
                Ok(proposed) => {
                    let accepted = apply_supplement(&mut mapping, &proposed, headers);
                    if !accepted.is_empty() {
                        log_info_indent(format!("AI mapping added {} fields", accepted.len()), 1);
                    }
                }
                Err(e) => {
                    let warning = format!("Header mapping call failed: {}", e);
                    log_warning_indent(&warning, 1);
                    warnings.push(warning);
                }
            }
        }
    }

    for (field, header) in mapping.iter() {
        log_info_indent(format!("{} → {}", header, field), 2);
    }
    mapping
}

/// Check a normalized row against the schema and build the record.
pub fn validate_record(row: Map<String, Value>) -> Result<ProductRecord, RecordError> {
    let doc_code = row
        .get("doc_code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let value = Value::Object(row);

    validate_product(&value).map_err(|errors| RecordError::ValidationFailed {
        doc_code: doc_code.clone(),
        errors,
    })?;

    serde_json::from_value(value).map_err(|e| RecordError::ValidationFailed {
        doc_code,
        errors: vec![e.to_string()],
    })
}

// =============================================================================
// Whole files
// =============================================================================

/// Extract every sheet concurrently. Results keep workbook order.
pub async fn extract_workbook(
    sheets: &[Sheet],
    services: &AiServices,
    options: &ParserOptions,
) -> Vec<ProductSchedule> {
    let schedules = join_all(
        sheets
            .iter()
            .map(|sheet| extract_products_from_sheet(&sheet.grid, &sheet.name, services, options)),
    )
    .await;

    let products: usize = schedules.iter().map(|s| s.products.len()).sum();
    let warnings: usize = schedules.iter().map(|s| s.warnings.len()).sum();
    log_success(format!(
        "{} sheets, {} products, {} warnings",
        schedules.len(),
        products,
        warnings
    ));
    schedules
}

/// Extract from uploaded bytes; the file name selects the decoder.
pub async fn extract_from_bytes(
    bytes: &[u8],
    file_name: &str,
    services: &AiServices,
    options: &ParserOptions,
) -> PipelineResult<Vec<ProductSchedule>> {
    options.validate()?;
    log_info(format!("📖 Reading {} ({} bytes)", file_name, bytes.len()));
    let sheets = load_bytes(bytes, file_name)?;
    log_success(format!("Loaded {} sheets", sheets.len()));
    Ok(extract_workbook(&sheets, services, options).await)
}

/// Extract from a file on disk.
pub async fn extract_from_path<P: AsRef<Path>>(
    path: P,
    services: &AiServices,
    options: &ParserOptions,
) -> PipelineResult<Vec<ProductSchedule>> {
    options.validate()?;
    let path = path.as_ref();
    log_info(format!("📖 Reading {}", path.display()));
    let sheets = load_path(path)?;
    log_success(format!("Loaded {} sheets", sheets.len()));
    Ok(extract_workbook(&sheets, services, options).await)
}

// =============================================================================
// Header inspection
// =============================================================================

/// Detected header row and heuristic mapping of one sheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetHeaders {
    pub sheet_name: String,
    pub header_row: Option<usize>,
    pub density: f64,
    pub headers: Vec<String>,
    pub mapping: HeaderMapping,
}

/// Header row and alias mapping per sheet, without any external calls.
pub fn inspect_headers(sheets: &[Sheet], options: &ParserOptions) -> Vec<SheetHeaders> {
    let mapper = HeaderMapper::new(&options.aliases);
    sheets
        .iter()
        .map(|sheet| match find_header_row(&sheet.grid, options.header_threshold) {
            Some(header) => {
                let table = DataTable::from_grid(&sheet.grid, header.index);
                let mapping = mapper.map(&table.headers);
                SheetHeaders {
                    sheet_name: sheet.name.clone(),
                    header_row: Some(header.index),
                    density: header.density,
                    headers: table.headers,
                    mapping,
                }
            }
            None => SheetHeaders {
                sheet_name: sheet.name.clone(),
                header_row: None,
                density: 0.0,
                headers: Vec::new(),
                mapping: HeaderMapping::new(),
            },
        })
        .collect()
}

// =============================================================================
// CSV export
// =============================================================================

/// Write every product as one CSV row, prefixed with its schedule name.
pub fn write_products_csv<W: Write>(schedules: &[ProductSchedule], writer: W) -> PipelineResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["schedule_name"];
    header.extend(CanonicalField::ALL.iter().map(|f| f.as_str()));
    wtr.write_record(&header)?;

    for schedule in schedules {
        for product in &schedule.products {
            let mut record = vec![schedule.schedule_name.clone()];
            record.extend(record_cells(product));
            wtr.write_record(&record)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

fn record_cells(p: &ProductRecord) -> Vec<String> {
    vec![
        p.doc_code.clone(),
        p.product_name.clone(),
        p.brand.clone(),
        p.colour.clone(),
        p.finish.clone(),
        p.material.clone(),
        p.width.to_string(),
        p.length.to_string(),
        p.height.to_string(),
        p.qty.to_string(),
        p.rrp.to_string(),
        p.feature_image.clone().unwrap_or_default(),
        p.product_description.clone(),
        p.product_details.clone(),
    ]
}
