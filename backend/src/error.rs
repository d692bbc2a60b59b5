//! Error types for the schedule extraction pipeline.
//!
//! Sheet-level failures and record-level failures are separate types so the
//! orchestrator can tell them apart:
//!
//! - [`GridError`] - Turning a file into raw grids
//! - [`SheetError`] - Conditions that abort one sheet
//! - [`AiError`] - External capability failures (degrade, never abort)
//! - [`RecordError`] - A single record that cannot fit the schema
//! - [`ConfigError`] - Invalid options or alias files
//! - [`PipelineError`] - Top-level file-based entry points
//! - [`ServerError`] - HTTP layer
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Grid Loading Errors
// =============================================================================

/// Errors while decoding a file into raw grids.
#[derive(Debug, Error)]
pub enum GridError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Extension we cannot decode.
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Workbook decoding failed.
    #[error("Invalid workbook: {0}")]
    Workbook(String),

    /// CSV decoding failed.
    #[error("Invalid CSV: {0}")]
    Csv(String),

    /// Workbook without sheets.
    #[error("Workbook has no sheets")]
    EmptyWorkbook,
}

// =============================================================================
// Sheet Errors
// =============================================================================

/// Conditions that abort extraction for one sheet.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SheetError {
    /// No row reaches the density threshold.
    #[error("No header row found above threshold {threshold}")]
    HeaderNotFound { threshold: f64 },

    /// No column could be identified as `doc_code`.
    #[error("No doc_code column found - cannot group products")]
    GroupingKeyMissing,
}

// =============================================================================
// AI Client Errors
// =============================================================================

/// Errors from the external enrichment and header-mapping services.
#[derive(Debug, Clone, Error)]
pub enum AiError {
    /// Missing API key.
    #[error("Missing ANTHROPIC_API_KEY environment variable")]
    MissingApiKey,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Error reported by the API.
    #[error("API error: {0}")]
    ApiError(String),

    /// Response was not the JSON we asked for.
    #[error("Invalid AI response: {0}")]
    InvalidJson(String),

    /// Timeout.
    #[error("Request timed out")]
    Timeout,
}

// =============================================================================
// Record Errors
// =============================================================================

/// A record whose values cannot populate the product schema.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    #[error("Validation failed for product {doc_code}: {}", .errors.join("; "))]
    ValidationFailed {
        doc_code: String,
        errors: Vec<String>,
    },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid options or configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid option: {0}")]
    Invalid(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors for whole-file extraction.
///
/// Nothing that happens inside a sheet ends up here: sheet and record
/// failures become warnings on the sheet's schedule.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// File could not be decoded.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// Options were rejected.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV export failed.
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Error processing file: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("{0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for grid loading.
pub type GridResult<T> = Result<T, GridError>;

/// Result type for AI operations.
pub type AiResult<T> = Result<T, AiError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
