//! Header detection and header-to-field mapping.
//!
//! Schedules rarely start at row 0: titles, project blocks and logos sit
//! above the real header. The header row is the first row dense enough to
//! look like one; its labels are then matched against the alias table.

use std::collections::{HashMap, HashSet};

use crate::config::HeaderAliasTable;
use crate::grid::{Cell, RawGrid};
use crate::models::{CanonicalField, HeaderMapping};

/// Aliases shorter than this never match as substrings ("w" in "raw").
const MIN_SUBSTRING_ALIAS_LEN: usize = 3;

/// Label used for blank header cells.
const BLANK_HEADER: &str = "nan";

/// The detected header row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderRow {
    pub index: usize,
    /// Fraction of filled cells in that row.
    pub density: f64,
}

/// Find the first row whose filled-cell fraction reaches `threshold`.
///
/// Returns `None` for an empty grid or when no row qualifies.
pub fn find_header_row(grid: &RawGrid, threshold: f64) -> Option<HeaderRow> {
    if grid.is_empty() {
        return None;
    }
    (0..grid.height())
        .map(|index| HeaderRow {
            index,
            density: grid.row_completeness(index),
        })
        .find(|row| row.density >= threshold)
}

/// Turn header cells into unique labels.
///
/// Blank cells become `"nan"`; the n-th repeat of a label gets `_n`.
///
/// ```ignore
/// ["name", "name", "", <missing>] -> ["name", "name_1", "nan", "nan_1"]
/// ```
pub fn make_unique(headers: &[Cell]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(headers.len());

    for cell in headers {
        let clean = cell
            .to_text()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| BLANK_HEADER.to_string());

        let mut count = seen.get(&clean).copied().unwrap_or(0);
        let mut label = suffixed(&clean, count);
        // A literal "name_1" earlier in the row must not collide with a generated one.
        while used.contains(&label) {
            count += 1;
            label = suffixed(&clean, count);
        }
        seen.insert(clean, count + 1);
        used.insert(label.clone());
        result.push(label);
    }

    result
}

fn suffixed(base: &str, count: usize) -> String {
    if count == 0 {
        base.to_string()
    } else {
        format!("{}_{}", base, count)
    }
}

/// Maps raw header labels to canonical fields using an alias table.
#[derive(Debug, Clone)]
pub struct HeaderMapper<'a> {
    aliases: &'a HeaderAliasTable,
}

impl<'a> HeaderMapper<'a> {
    pub fn new(aliases: &'a HeaderAliasTable) -> Self {
        Self { aliases }
    }

    /// Heuristic mapping: exact alias matches first, then substrings.
    pub fn map(&self, headers: &[String]) -> HeaderMapping {
        let cols: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut mapping = HeaderMapping::new();

        // Pass 1: exact matches, fields in table order, first alias wins
        for entry in self.aliases.entries() {
            if mapping.contains_field(entry.field) {
                continue;
            }
            let hit = entry.aliases.iter().find_map(|alias| {
                cols.iter()
                    .zip(headers)
                    .find(|(col, raw)| *col == alias && !mapping.uses_header(raw))
                    .map(|(_, raw)| raw.clone())
            });
            if let Some(raw) = hit {
                mapping.insert(entry.field, raw);
            }
        }

        // Pass 2: substring matches (min 3 chars) for headers still free
        for (raw, col) in headers.iter().zip(&cols) {
            if mapping.uses_header(raw) {
                continue;
            }
            let field = self
                .aliases
                .entries()
                .iter()
                .filter(|e| !mapping.contains_field(e.field))
                .find(|e| {
                    e.aliases
                        .iter()
                        .any(|a| a.chars().count() >= MIN_SUBSTRING_ALIAS_LEN && col.contains(a.as_str()))
                })
                .map(|e| e.field);
            if let Some(field) = field {
                mapping.insert(field, raw.clone());
            }
        }

        mapping
    }
}

/// Merge externally proposed mappings into a heuristic mapping.
///
/// A proposal is taken only for a field that is still unmapped, naming a
/// header that exists and is not already used. Returns the accepted pairs.
pub fn apply_supplement(
    mapping: &mut HeaderMapping,
    proposed: &HashMap<String, String>,
    headers: &[String],
) -> Vec<(CanonicalField, String)> {
    let mut candidates: Vec<(CanonicalField, &String)> = proposed
        .iter()
        .filter_map(|(field, raw)| CanonicalField::from_name(field).map(|f| (f, raw)))
        .collect();
    candidates.sort_by_key(|(f, _)| *f);

    let mut accepted = Vec::new();
    for (field, raw) in candidates {
        if !headers.contains(raw) {
            continue;
        }
        if mapping.insert(field, raw.clone()) {
            accepted.push((field, raw.clone()));
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn heuristic(names: &[&str]) -> HeaderMapping {
        let table = HeaderAliasTable::default();
        HeaderMapper::new(&table).map(&labels(names))
    }

    #[test]
    fn test_make_unique() {
        let headers = vec![
            Cell::text("name"),
            Cell::text("name"),
            Cell::Text(String::new()),
            Cell::Missing,
        ];
        assert_eq!(make_unique(&headers), vec!["name", "name_1", "nan", "nan_1"]);
    }

    #[test]
    fn test_make_unique_avoids_literal_collisions() {
        let headers = vec![Cell::text("name_1"), Cell::text("name"), Cell::text("name")];
        assert_eq!(make_unique(&headers), vec!["name_1", "name", "name_2"]);
    }

    #[test]
    fn test_make_unique_numbers_and_trim() {
        let headers = vec![Cell::Number(2024.0), Cell::text("  Brand ")];
        assert_eq!(make_unique(&headers), vec!["2024", "Brand"]);
    }

    #[test]
    fn test_find_header_row() {
        let grid = RawGrid::from_json(&json!([
            [null, null, null],
            ["H1", "H2", null],
            ["V1", "V2", null],
        ]));
        // Rows 1 and 2 are 66% dense; the first one wins.
        assert_eq!(find_header_row(&grid, 0.5).map(|r| r.index), Some(1));
        assert_eq!(find_header_row(&grid, 0.8), None);
    }

    #[test]
    fn test_find_header_row_empty_grid() {
        assert_eq!(find_header_row(&RawGrid::default(), 0.7), None);
    }

    #[test]
    fn test_exact_match() {
        let mapping = heuristic(&["doc_code", "w"]);
        assert_eq!(mapping.get(CanonicalField::DocCode), Some("doc_code"));
        assert_eq!(mapping.get(CanonicalField::Width), Some("w"));
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let mapping = heuristic(&[" Code ", "BRAND", "Qty"]);
        assert_eq!(mapping.get(CanonicalField::DocCode), Some(" Code "));
        assert_eq!(mapping.get(CanonicalField::Brand), Some("BRAND"));
        assert_eq!(mapping.get(CanonicalField::Qty), Some("Qty"));
    }

    #[test]
    fn test_first_alias_wins() {
        // "reference" is listed before "code" for doc_code
        let mapping = heuristic(&["code", "reference"]);
        assert_eq!(mapping.get(CanonicalField::DocCode), Some("reference"));
    }

    #[test]
    fn test_substring_match() {
        let mapping = heuristic(&["width_mm"]);
        assert_eq!(mapping.get(CanonicalField::Width), Some("width_mm"));
    }

    #[test]
    fn test_short_alias_never_substring_matches() {
        let mapping = heuristic(&["w_mm"]);
        assert!(!mapping.contains_field(CanonicalField::Width));
    }

    #[test]
    fn test_exact_beats_substring() {
        // "colour code" would substring-match doc_code via "code", but the
        // exact "ref" column claims doc_code first.
        let mapping = heuristic(&["colour code", "ref"]);
        assert_eq!(mapping.get(CanonicalField::DocCode), Some("ref"));
        assert_eq!(mapping.get(CanonicalField::Colour), Some("colour code"));
    }

    #[test]
    fn test_header_used_by_exact_pass_is_not_reused() {
        let mapping = heuristic(&["finish", "finish color"]);
        assert_eq!(mapping.get(CanonicalField::Colour), Some("finish color"));
        assert_eq!(mapping.get(CanonicalField::Finish), Some("finish"));
    }

    #[test]
    fn test_raw_header_maps_once() {
        let mapping = heuristic(&["Item", "Product Description", "Manufacturer Notes"]);
        assert_eq!(mapping.get(CanonicalField::ProductName), Some("Item"));
        assert_eq!(
            mapping.get(CanonicalField::ProductDescription),
            Some("Product Description")
        );
        // brand ("manufacturer") comes before product_details ("notes") in table order
        assert_eq!(mapping.get(CanonicalField::Brand), Some("Manufacturer Notes"));
        assert!(!mapping.contains_field(CanonicalField::ProductDetails));
    }

    #[test]
    fn test_custom_alias_table() {
        let table = HeaderAliasTable::new([
            (CanonicalField::DocCode, vec!["tag"]),
            (CanonicalField::ProductName, vec!["designation"]),
        ]);
        let mapping = HeaderMapper::new(&table).map(&labels(&["Tag", "Designation", "Code"]));
        assert_eq!(mapping.get(CanonicalField::DocCode), Some("Tag"));
        assert_eq!(mapping.get(CanonicalField::ProductName), Some("Designation"));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_supplement_only_fills_gaps() {
        let headers = labels(&["Code", "Vendor", "Thing"]);
        let mut mapping = heuristic(&["Code", "Vendor", "Thing"]);
        assert!(!mapping.contains_field(CanonicalField::Brand));

        let proposed: HashMap<String, String> = [
            ("doc_code", "Thing"),
            ("brand", "Vendor"),
            ("colour", "Missing Column"),
            ("not_a_field", "Thing"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let accepted = apply_supplement(&mut mapping, &proposed, &headers);
        assert_eq!(accepted, vec![(CanonicalField::Brand, "Vendor".to_string())]);
        assert_eq!(mapping.get(CanonicalField::DocCode), Some("Code"));
        assert!(!mapping.contains_field(CanonicalField::Colour));
    }
}
