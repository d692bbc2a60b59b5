//! Drop rows that are not products: signature blocks, footers, notes.

use serde_json::{Map, Value};

/// Codes that never identify a product.
const JUNK_CODES: [&str; 5] = ["nan", "none", "*", "-", "."];

/// Fields that identify a product on their own.
const IDENTITY_FIELDS: [&str; 3] = ["product_name", "brand", "product_description"];

/// Attribute fields; two of them are enough to keep a row.
const ATTRIBUTE_FIELDS: [&str; 4] = ["colour", "finish", "material", "product_details"];

fn has_text(row: &Map<String, Value>, field: &str) -> bool {
    match row.get(field) {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

/// Whether a normalized row looks like a real product.
pub fn is_meaningful(row: &Map<String, Value>) -> bool {
    let code = match row.get("doc_code") {
        Some(Value::String(s)) => s.trim().to_lowercase(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    if code.is_empty() || JUNK_CODES.contains(&code.as_str()) {
        return false;
    }

    let has_identity = IDENTITY_FIELDS.iter().any(|f| has_text(row, f));
    let attribute_count = ATTRIBUTE_FIELDS.iter().filter(|f| has_text(row, f)).count();

    has_identity || attribute_count >= 2
}
