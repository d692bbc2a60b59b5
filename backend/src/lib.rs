//! # Schedule Parser - product records from architectural schedules
//!
//! Reads interior and architectural schedule spreadsheets (Excel or CSV),
//! finds the header row of each sheet, groups multi-row products, optionally
//! asks an AI service to clean up product text, and returns validated
//! product records, one schedule per sheet.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook   │────▶│    Grid     │────▶│  Transform  │────▶│  Schedules  │
//! │ (xlsx/csv)  │     │ (per sheet) │     │ (AI + rules)│     │   (JSON)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use schedule_parser::{extract_from_path, AiServices, ParserOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let schedules = extract_from_path(
//!         "schedule.xlsx",
//!         &AiServices::from_env_or_none(),
//!         &ParserOptions::default(),
//!     ).await.unwrap();
//!     println!("Extracted {} sheets", schedules.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Canonical fields, mappings and product records
//! - [`config`] - Header aliases, parser options, AI settings
//! - [`grid`] - Workbook and CSV decoding into raw grids
//! - [`transform`] - Header detection, grouping, enrichment, normalization
//! - [`validation`] - Product record schema validation
//! - [`ai`] - Extraction and header-mapping services
//! - [`api`] - HTTP API server and log streaming

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Input
pub mod grid;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// AI
pub mod ai;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AiError, ConfigError, GridError, PipelineError, RecordError, ServerError, SheetError,
};

// =============================================================================
// Re-exports - Models and configuration
// =============================================================================

pub use config::{AiConfig, HeaderAliasTable, ParserOptions};
pub use models::{CanonicalField, HeaderMapping, PartialProduct, ProductRecord, ProductSchedule};

// =============================================================================
// Re-exports - Grids
// =============================================================================

pub use grid::{load_bytes, load_path, Cell, RawGrid, Sheet};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid, is_valid_product, validate, validate_product};

// =============================================================================
// Re-exports - AI
// =============================================================================

pub use ai::{AiClient, AiServices, HeaderMatcher, ProductExtractor};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    extract_from_bytes, extract_from_path, extract_products_from_sheet, extract_workbook,
    inspect_headers, write_products_csv, SheetHeaders,
};

// Server
pub mod server {
    pub use crate::api::server::{start_server, AppState};
}
