//! Final cleaning of aggregated products into schema-shaped JSON rows.
//!
//! | Field kind        | Rule                                                   |
//! |-------------------|--------------------------------------------------------|
//! | text              | trimmed, `nan` → empty, upper-cased (except free text) |
//! | width/length/...  | first number, metres → mm, truncated                   |
//! | rrp               | non-digits stripped, parsed as float, else `0.0`       |
//! | qty               | first digit run, else `1`                              |

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::grid::Cell;
use crate::models::{CanonicalField, FieldKind};

use super::grouper::ProductRow;

static NUMBER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());
static METRE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bM\b").unwrap());
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static NOT_PRICE_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.]").unwrap());

/// Dimension in whole millimetres.
///
/// ```ignore
/// "1.5 metres" -> 1500
/// "600 mm"     -> 600
/// "$299.99"    -> 299
/// "TBD"        -> 0
/// ```
pub fn clean_numeric_string(raw: &str) -> f64 {
    let s = raw.trim().to_uppercase();
    if s.is_empty() || s == "TBD" {
        return 0.0;
    }
    let Some(num) = NUMBER_TOKEN
        .captures(&s)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
    else {
        return 0.0;
    };

    let is_metres = s.contains("METRE") || (METRE_TOKEN.is_match(&s) && !s.contains("MM"));
    if is_metres {
        (num * 1000.0).trunc()
    } else {
        num.trunc()
    }
}

/// Price without currency symbols; `0.0` when nothing parses.
pub fn clean_price(raw: &str) -> f64 {
    NOT_PRICE_CHAR
        .replace_all(raw, "")
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
}

/// Quantity from the first digit run; `1` when there is none.
///
/// Digit runs too large for an integer are passed through as text so
/// validation reports them.
pub fn clean_qty(raw: &str) -> Value {
    match DIGIT_RUN.find(raw) {
        Some(m) => m
            .as_str()
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(m.as_str().to_string())),
        None => json!(1),
    }
}

fn clean_text(field: CanonicalField, cell: &Cell) -> String {
    let value = cell.display().trim().to_string();
    let value = if value == "nan" { String::new() } else { value };
    if field.preserves_case() {
        value
    } else {
        value.to_uppercase()
    }
}

fn integer_value(n: f64) -> Value {
    if n >= 0.0 && n <= u64::MAX as f64 {
        Value::from(n as u64)
    } else {
        json!(n)
    }
}

/// Normalize one product into a JSON object with every canonical field.
pub fn normalize_product(product: &ProductRow) -> Map<String, Value> {
    let mut row = Map::new();
    for field in CanonicalField::ALL {
        let cell = product.get(field);
        let value = match field.kind() {
            FieldKind::Text => Value::String(clean_text(field, cell)),
            FieldKind::OptionalText => {
                let text = clean_text(field, cell);
                if text.is_empty() {
                    Value::Null
                } else {
                    Value::String(text)
                }
            }
            FieldKind::Integer if field == CanonicalField::Qty => clean_qty(&cell.display()),
            FieldKind::Integer => integer_value(clean_numeric_string(&cell.display())),
            FieldKind::Float => json!(clean_price(&cell.display())),
        };
        row.insert(field.as_str().to_string(), value);
    }
    row
}

pub fn normalize_products(products: &[ProductRow]) -> Vec<Map<String, Value>> {
    products.iter().map(normalize_product).collect()
}
