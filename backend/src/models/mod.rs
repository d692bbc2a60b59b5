//! Domain models for the product catalog.
//!
//! This module contains the core types:
//! - [`CanonicalField`] - The closed set of output fields
//! - [`HeaderMapping`] - Canonical field to raw column header
//! - [`PartialProduct`] - Field values proposed by the enrichment service
//! - [`ProductRecord`] - One validated product
//! - [`ProductSchedule`] - All products of one sheet, plus warnings

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::grid::Cell;

// =============================================================================
// Canonical Fields
// =============================================================================

/// Declared type of a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain text, defaults to `""`.
    Text,
    /// Text that defaults to `None`.
    OptionalText,
    /// Integer, defaults to `0` (or `1` for `qty`).
    Integer,
    /// Float, defaults to `0.0`.
    Float,
}

/// One attribute of the product schema.
///
/// Declaration order is the order used by the header alias table
/// and by every output record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    DocCode,
    ProductName,
    Brand,
    Colour,
    Finish,
    Material,
    Width,
    Length,
    Height,
    Qty,
    Rrp,
    FeatureImage,
    ProductDescription,
    ProductDetails,
}

impl CanonicalField {
    /// All fields in declaration order.
    pub const ALL: [CanonicalField; 14] = [
        Self::DocCode,
        Self::ProductName,
        Self::Brand,
        Self::Colour,
        Self::Finish,
        Self::Material,
        Self::Width,
        Self::Length,
        Self::Height,
        Self::Qty,
        Self::Rrp,
        Self::FeatureImage,
        Self::ProductDescription,
        Self::ProductDetails,
    ];

    /// Field name as it appears in output records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocCode => "doc_code",
            Self::ProductName => "product_name",
            Self::Brand => "brand",
            Self::Colour => "colour",
            Self::Finish => "finish",
            Self::Material => "material",
            Self::Width => "width",
            Self::Length => "length",
            Self::Height => "height",
            Self::Qty => "qty",
            Self::Rrp => "rrp",
            Self::FeatureImage => "feature_image",
            Self::ProductDescription => "product_description",
            Self::ProductDetails => "product_details",
        }
    }

    /// Parse a field name (case-insensitive, trimmed).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Width | Self::Length | Self::Height | Self::Qty => FieldKind::Integer,
            Self::Rrp => FieldKind::Float,
            Self::FeatureImage => FieldKind::OptionalText,
            _ => FieldKind::Text,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind(), FieldKind::Text | FieldKind::OptionalText)
    }

    /// Text fields that keep their original case after normalization.
    pub fn preserves_case(&self) -> bool {
        matches!(
            self,
            Self::ProductDescription | Self::ProductDetails | Self::FeatureImage
        )
    }

    pub fn is_dimension(&self) -> bool {
        matches!(self, Self::Width | Self::Length | Self::Height)
    }

    /// Default value used when the field is unmapped or unpopulated.
    pub fn default_value(&self) -> Value {
        match (self, self.kind()) {
            (Self::Qty, _) => json!(1),
            (_, FieldKind::Text) => json!(""),
            (_, FieldKind::OptionalText) => Value::Null,
            (_, FieldKind::Integer) => json!(0),
            (_, FieldKind::Float) => json!(0.0),
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Header Mapping
// =============================================================================

/// Mapping from canonical field to the single raw header feeding it.
///
/// Once a field is mapped it keeps its header, and a raw header feeds
/// at most one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderMapping {
    fields: BTreeMap<CanonicalField, String>,
}

impl HeaderMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `field` to `header` unless either side is already taken.
    ///
    /// Returns `true` when the mapping was recorded.
    pub fn insert(&mut self, field: CanonicalField, header: impl Into<String>) -> bool {
        let header = header.into();
        if self.contains_field(field) || self.uses_header(&header) {
            return false;
        }
        self.fields.insert(field, header);
        true
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn contains_field(&self, field: CanonicalField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn uses_header(&self, header: &str) -> bool {
        self.fields.values().any(|h| h == header)
    }

    /// Canonical field fed by a raw header, if any.
    pub fn field_for_header(&self, header: &str) -> Option<CanonicalField> {
        self.fields
            .iter()
            .find(|(_, h)| h.as_str() == header)
            .map(|(f, _)| *f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.fields.iter().map(|(f, h)| (*f, h.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// =============================================================================
// Partial Product (enrichment result)
// =============================================================================

/// Field values proposed by the enrichment service for one text blob.
///
/// Only the fields the service actually returned are present. The default
/// value is empty and therefore changes nothing when merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialProduct {
    values: BTreeMap<CanonicalField, Cell>,
}

impl PartialProduct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a service response leniently.
    ///
    /// Keys naming a canonical field with a string or number value are kept;
    /// everything else is ignored.
    pub fn from_json(value: &Value) -> Self {
        let mut partial = Self::new();
        let Some(obj) = value.as_object() else {
            return partial;
        };
        for (key, v) in obj {
            let Some(field) = CanonicalField::from_name(key) else {
                continue;
            };
            match v {
                Value::String(s) => partial.set(field, Cell::Text(s.clone())),
                Value::Number(n) => {
                    if let Some(f) = n.as_f64() {
                        partial.set(field, Cell::Number(f));
                    }
                }
                _ => {}
            }
        }
        partial
    }

    pub fn set(&mut self, field: CanonicalField, cell: Cell) {
        self.values.insert(field, cell);
    }

    pub fn get(&self, field: CanonicalField) -> Option<&Cell> {
        self.values.get(&field)
    }

    /// Value for `field` if the service supplied something non-empty.
    pub fn supplied(&self, field: CanonicalField) -> Option<&Cell> {
        self.get(field).filter(|c| !c.is_blank())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stand-in answer for a failed call: every field at its default value.
    ///
    /// Text defaults are empty and never merge, so only the numeric fields
    /// (`qty` = 1, the rest 0) can fill placeholders.
    pub fn defaults() -> Self {
        let mut partial = Self::new();
        for field in CanonicalField::ALL {
            if let Some(n) = field.default_value().as_f64() {
                partial.set(field, Cell::Number(n));
            }
        }
        partial
    }
}

// =============================================================================
// Product Record
// =============================================================================

fn default_qty() -> u32 {
    1
}

/// A product in the final catalog.
///
/// Dimensions are whole millimetres, `rrp` carries no currency symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductRecord {
    /// Drawing or reference code.
    #[serde(default)]
    pub doc_code: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub colour: String,
    /// Surface finish.
    #[serde(default)]
    pub finish: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default = "default_qty")]
    pub qty: u32,
    /// Recommended retail price.
    #[serde(default)]
    pub rrp: f64,
    /// Image filename.
    #[serde(default)]
    pub feature_image: Option<String>,
    /// Short description.
    #[serde(default)]
    pub product_description: String,
    /// Additional specifications.
    #[serde(default)]
    pub product_details: String,
}

impl Default for ProductRecord {
    fn default() -> Self {
        Self {
            doc_code: String::new(),
            product_name: String::new(),
            brand: String::new(),
            colour: String::new(),
            finish: String::new(),
            material: String::new(),
            width: 0,
            length: 0,
            height: 0,
            qty: default_qty(),
            rrp: 0.0,
            feature_image: None,
            product_description: String::new(),
            product_details: String::new(),
        }
    }
}

/// Products extracted from one sheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductSchedule {
    pub schedule_name: String,
    pub products: Vec<ProductRecord>,
    /// Sheet- and record-level degradations, human readable.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ProductSchedule {
    pub fn new(schedule_name: impl Into<String>) -> Self {
        Self {
            schedule_name: schedule_name.into(),
            ..Self::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
