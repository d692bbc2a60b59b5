//! JSON Schema validation for product records.
//!
//! Normalized rows are checked against the product record schema
//! (JSON Schema Draft 7) before being deserialized into
//! [`ProductRecord`](crate::models::ProductRecord).
//!
//! # Embedded Schema
//!
//! The schema is embedded at compile time from the `schemas/` directory:
//! - `product-record.json`
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use schedule_parser::validation::{validate_product, is_valid_product};
//!
//! let row = json!({ "doc_code": "F64", "width": 600, "qty": 4 });
//! assert!(validate_product(&row).is_ok());
//!
//! let bad = json!({ "doc_code": "F64", "qty": "many" });
//! assert!(!is_valid_product(&bad));
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

const PRODUCT_SCHEMA: &str = include_str!("../../schemas/product-record.json");

static PRODUCT_SCHEMA_VALUE: Lazy<Result<Value, String>> =
    Lazy::new(|| serde_json::from_str(PRODUCT_SCHEMA).map_err(|e| format!("Invalid embedded schema: {}", e)));

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every error otherwise
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use schedule_parser::validation::validate;
///
/// let schema = json!({
///     "type": "object",
///     "required": ["name"],
///     "properties": {
///         "name": { "type": "string" }
///     }
/// });
///
/// assert!(validate(&schema, &json!({ "name": "test" })).is_ok());
/// assert!(validate(&schema, &json!({ "age": 42 })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Simpler variant: just true/false.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate one normalized row against the product record schema.
pub fn validate_product(data: &Value) -> Result<(), Vec<String>> {
    let schema = PRODUCT_SCHEMA_VALUE.as_ref().map_err(|e| vec![e.clone()])?;
    validate(schema, data)
}

/// Quick check against the product record schema.
pub fn is_valid_product(data: &Value) -> bool {
    validate_product(data).is_ok()
}
