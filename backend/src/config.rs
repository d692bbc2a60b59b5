//! Configuration: header aliases, parser options and AI settings.
//!
//! The alias table is plain data handed to the header mapper, so tests and
//! deployments can swap in their own vocabulary (see
//! [`HeaderAliasTable::from_json_file`]).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::{AiError, ConfigError};
use crate::models::CanonicalField;

/// Default density a row needs to count as the header row.
pub const DEFAULT_HEADER_THRESHOLD: f64 = 0.7;

/// Default number of enrichment calls in flight per sheet.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default model for extraction and header mapping.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default per-request timeout for AI calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Header Aliases
// =============================================================================

/// One canonical field and its known raw header spellings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub field: CanonicalField,
    pub aliases: Vec<String>,
}

/// Ordered alias lists per canonical field.
///
/// Order matters twice: fields are matched in table order, and within a
/// field the first matching alias wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderAliasTable {
    entries: Vec<AliasEntry>,
}

impl HeaderAliasTable {
    /// Build a table; aliases are stored lowercased and trimmed.
    pub fn new<I, A, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (CanonicalField, A)>,
        A: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|(field, aliases)| AliasEntry {
                field,
                aliases: aliases
                    .into_iter()
                    .map(|a| a.as_ref().trim().to_lowercase())
                    .collect(),
            })
            .collect();
        Self { entries }
    }

    /// Load a table from a JSON array of `{"field": ..., "aliases": [...]}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: Vec<AliasEntry> = serde_json::from_str(json)?;
        let table = Self::new(raw.into_iter().map(|e| (e.field, e.aliases)));
        table.validate()?;
        Ok(table)
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.aliases.as_slice())
            .unwrap_or(&[])
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, entry) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|e| e.field == entry.field) {
                return Err(ConfigError::Invalid(format!(
                    "field '{}' listed twice in alias table",
                    entry.field
                )));
            }
        }
        Ok(())
    }
}

impl Default for HeaderAliasTable {
    fn default() -> Self {
        use CanonicalField::*;
        Self::new([
            (DocCode, vec!["doc_code", "reference", "code", "ref", "sku", "item no", "model"]),
            (ProductName, vec!["item", "product", "name", "title", "description"]),
            (Brand, vec!["brand", "manufacturer", "supplier", "make", "mfr"]),
            (Colour, vec!["colour", "color", "col", "finish color"]),
            (Finish, vec!["finish", "surface", "texture", "sheen", "polished", "matt"]),
            (Material, vec!["material", "mat", "composition", "fabric", "species"]),
            (Width, vec!["width", "w", "w(mm)", "width (mm)"]),
            (Length, vec!["length", "l", "depth", "d", "l(mm)", "d(mm)"]),
            (Height, vec!["height", "h", "height (mm)", "thickness"]),
            (Qty, vec!["qty", "quantity", "count", "units", "pcs"]),
            (Rrp, vec!["price", "cost", "rrp", "unit price", "$"]),
            (FeatureImage, vec!["image", "picture", "photo", "img"]),
            (
                ProductDescription,
                vec!["product description", "short description", "desc", "overview"],
            ),
            (ProductDetails, vec!["details", "specifications", "specs", "remarks", "notes"]),
        ])
    }
}

// =============================================================================
// Parser Options
// =============================================================================

/// Options for the per-sheet extraction pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserOptions {
    /// Minimum fraction of filled cells for the header row
    pub header_threshold: f64,

    /// Enrichment calls in flight at once, per sheet
    pub max_concurrency: usize,

    /// Send product text to the enrichment service
    pub enrich_products: bool,

    /// Ask the header-mapping service for fields the aliases missed
    pub ai_header_mapping: bool,

    /// Header vocabulary
    pub aliases: HeaderAliasTable,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            header_threshold: DEFAULT_HEADER_THRESHOLD,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            enrich_products: true,
            ai_header_mapping: true,
            aliases: HeaderAliasTable::default(),
        }
    }
}

impl ParserOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.header_threshold > 0.0 && self.header_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "header_threshold must be in (0, 1], got {}",
                self.header_threshold
            )));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// AI Settings
// =============================================================================

/// Settings for the Anthropic-backed services.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl AiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `ANTHROPIC_API_KEY`, `SCHEDULE_AI_MODEL` and
    /// `SCHEDULE_AI_TIMEOUT_SECS` (after loading `.env` if present).
    pub fn from_env() -> Result<Self, AiError> {
        let _ = dotenvy::dotenv();

        let api_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AiError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(model) = env::var("SCHEDULE_AI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Some(secs) = env::var("SCHEDULE_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
        {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_table_covers_every_field_in_order() {
        let table = HeaderAliasTable::default();
        let fields: Vec<_> = table.entries().iter().map(|e| e.field).collect();
        assert_eq!(fields, CanonicalField::ALL.to_vec());
        assert_eq!(table.aliases(CanonicalField::Width)[1], "w");
    }

    #[test]
    fn test_aliases_are_lowercased() {
        let table = HeaderAliasTable::new([(CanonicalField::DocCode, vec!["  Ref No "])]);
        assert_eq!(table.aliases(CanonicalField::DocCode), ["ref no".to_string()]);
        assert!(table.aliases(CanonicalField::Brand).is_empty());
    }

    #[test]
    fn test_alias_table_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"field": "doc_code", "aliases": ["Tag"]}}, {{"field": "brand", "aliases": ["maker"]}}]"#
        )
        .unwrap();

        let table = HeaderAliasTable::from_json_file(file.path()).unwrap();
        assert_eq!(table.entries().len(), 2);
        assert_eq!(table.aliases(CanonicalField::DocCode), ["tag".to_string()]);
    }

    #[test]
    fn test_alias_table_rejects_duplicate_fields() {
        let json = r#"[{"field": "brand", "aliases": ["a"]}, {"field": "brand", "aliases": ["b"]}]"#;
        assert!(matches!(
            HeaderAliasTable::from_json(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_alias_table_rejects_unknown_field() {
        let json = r#"[{"field": "group_id", "aliases": ["a"]}]"#;
        assert!(matches!(HeaderAliasTable::from_json(json), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_default_options() {
        let opts = ParserOptions::default();
        assert_eq!(opts.header_threshold, 0.7);
        assert_eq!(opts.max_concurrency, 5);
        assert!(opts.enrich_products);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_invalid_options() {
        let opts = ParserOptions {
            header_threshold: 0.0,
            ..ParserOptions::default()
        };
        assert!(opts.validate().is_err());

        let opts = ParserOptions {
            max_concurrency: 0,
            ..ParserOptions::default()
        };
        assert!(opts.validate().is_err());
    }
}
