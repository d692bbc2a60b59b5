//! Enrichment: send each product's text to the extraction service and merge
//! the answers back.
//!
//! Each product yields one labeled text blob. Identical blobs are sent once,
//! with at most `limit` calls in flight, and answers are matched back by blob
//! text, not completion order. A failed call counts as an all-defaults
//! answer: text fields stay as they are, numeric placeholders take their
//! defaults (`qty` becomes 1).

use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};

use crate::ai::{AiError, ProductExtractor};
use crate::api::logs::{log_info, log_warning};
use crate::grid::Cell;
use crate::models::{CanonicalField, PartialProduct};

use super::grouper::ProductRow;

/// Fields the service overwrites whenever it supplies a value.
pub const FORCE_OVERWRITE: [CanonicalField; 4] = [
    CanonicalField::ProductName,
    CanonicalField::Brand,
    CanonicalField::ProductDescription,
    CanonicalField::ProductDetails,
];

/// Fields that make up the text blob, in blob order.
const SOURCE_FIELDS: [CanonicalField; 4] = [
    CanonicalField::ProductName,
    CanonicalField::ProductDescription,
    CanonicalField::ProductDetails,
    CanonicalField::Brand,
];

/// Values that count as "nothing here yet" (compared upper-cased).
const PLACEHOLDERS: [&str; 6] = ["", "TBD", "NONE", "0", "0.0", "NAN"];

/// Labeled text for one product: `"<field>: <value>"` lines, empty fields skipped.
pub fn search_text(product: &ProductRow) -> String {
    SOURCE_FIELDS
        .iter()
        .filter_map(|field| {
            let value = product.text(*field);
            (!value.is_empty()).then(|| format!("{}: {}", field, value))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Non-empty blobs, deduplicated, in first-seen order.
pub fn unique_texts<'a>(texts: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .filter(|t| !t.is_empty() && seen.insert(t.as_str()))
        .cloned()
        .collect()
}

/// Missing, or a value such as `TBD`, `none` or `0`.
pub fn is_placeholder(cell: &Cell) -> bool {
    if cell.is_missing() {
        return true;
    }
    let value = cell.display().trim().to_uppercase();
    PLACEHOLDERS.contains(&value.as_str())
}

/// Merge service values into a product.
///
/// A field takes the service value when the value is non-empty and either
/// the field is force-overwritten or the current value is a placeholder.
pub fn merge_enrichment(product: &mut ProductRow, partial: &PartialProduct) {
    for field in CanonicalField::ALL {
        let Some(value) = partial.supplied(field) else {
            continue;
        };
        if FORCE_OVERWRITE.contains(&field) || is_placeholder(product.get(field)) {
            product.set(field, value.clone());
        }
    }
}

/// Call the extractor once per text, at most `limit` calls at a time.
///
/// Every call runs to completion; a failure only affects its own text.
pub async fn extract_batch(
    extractor: &dyn ProductExtractor,
    texts: Vec<String>,
    limit: usize,
) -> HashMap<String, Result<PartialProduct, AiError>> {
    stream::iter(texts.into_iter().map(|text| async move {
        let result = extractor.extract(&text).await;
        (text, result)
    }))
    .buffer_unordered(limit.max(1))
    .collect()
    .await
}

/// Enrich every product in place. Returns one warning per failed call.
pub async fn enrich_products(
    products: &mut [ProductRow],
    extractor: &dyn ProductExtractor,
    limit: usize,
) -> Vec<String> {
    let texts: Vec<String> = products.iter().map(search_text).collect();
    let unique = unique_texts(&texts);

    if unique.is_empty() {
        log_info("No text data to extract, skipping enrichment");
        return Vec::new();
    }

    log_info(format!(
        "Extracting data from {} rows ({} unique text blocks)",
        products.len(),
        unique.len()
    ));

    let results = extract_batch(extractor, unique.clone(), limit).await;

    let mut warnings = Vec::new();
    let mut answers: HashMap<&str, PartialProduct> = HashMap::new();
    // Walk in blob order so warnings come out deterministically
    for text in &unique {
        match results.get(text) {
            Some(Ok(partial)) => {
                answers.insert(text.as_str(), partial.clone());
            }
            Some(Err(e)) => {
                let warning = format!("Enrichment failed for \"{}\": {}", preview(text), e);
                log_warning(&warning);
                warnings.push(warning);
                answers.insert(text.as_str(), PartialProduct::defaults());
            }
            None => {}
        }
    }

    for (product, text) in products.iter_mut().zip(&texts) {
        if let Some(partial) = answers.get(text.as_str()) {
            merge_enrichment(product, partial);
        }
    }

    warnings
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " | ");
    if flat.chars().count() > 60 {
        format!("{}...", flat.chars().take(60).collect::<String>())
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers with a fixed brand, fails for blobs mentioning FAIL.
    struct MockExtractor {
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockExtractor {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProductExtractor for MockExtractor {
        async fn extract(&self, text: &str) -> Result<PartialProduct, AiError> {
            self.calls.lock().unwrap().push(text.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if text.contains("FAIL") {
                return Err(AiError::Timeout);
            }
            let mut partial = PartialProduct::new();
            partial.set(CanonicalField::Brand, Cell::text("Polytec"));
            partial.set(CanonicalField::Width, Cell::Number(300.0));
            partial.set(CanonicalField::Colour, Cell::text("Satin White"));
            Ok(partial)
        }
    }

    fn product(fields: &[(CanonicalField, Cell)]) -> ProductRow {
        let mut row = ProductRow::new();
        for (field, cell) in fields {
            row.set(*field, cell.clone());
        }
        row
    }

    #[test]
    fn test_search_text_order_and_labels() {
        let row = product(&[
            (CanonicalField::Brand, Cell::text("Polytec Pty Ltd, 12 Smith St")),
            (CanonicalField::ProductName, Cell::text(" Laminate ")),
            (CanonicalField::Colour, Cell::text("White")),
        ]);
        assert_eq!(
            search_text(&row),
            "product_name: Laminate\nbrand: Polytec Pty Ltd, 12 Smith St"
        );
        assert_eq!(search_text(&ProductRow::new()), "");
    }

    #[test]
    fn test_unique_texts() {
        let texts: Vec<String> = ["b", "", "a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(unique_texts(&texts), vec!["b", "a"]);
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder(&Cell::Missing));
        assert!(is_placeholder(&Cell::text("tbd")));
        assert!(is_placeholder(&Cell::text("None")));
        assert!(is_placeholder(&Cell::text("0.0")));
        assert!(is_placeholder(&Cell::text("nan")));
        assert!(is_placeholder(&Cell::Number(0.0)));
        assert!(is_placeholder(&Cell::Number(f64::NAN)));
        assert!(!is_placeholder(&Cell::text("Oak")));
        assert!(!is_placeholder(&Cell::Number(600.0)));
    }

    #[test]
    fn test_merge_rules() {
        let mut row = product(&[
            (CanonicalField::Brand, Cell::text("Polytec, call 555")),
            (CanonicalField::Colour, Cell::text("Red")),
            (CanonicalField::Width, Cell::text("TBD")),
        ]);
        let mut partial = PartialProduct::new();
        partial.set(CanonicalField::Brand, Cell::text("Polytec"));
        partial.set(CanonicalField::Colour, Cell::text("Blue"));
        partial.set(CanonicalField::Width, Cell::Number(300.0));
        partial.set(CanonicalField::Material, Cell::Text("   ".into()));

        merge_enrichment(&mut row, &partial);

        // forced
        assert_eq!(row.text(CanonicalField::Brand), "Polytec");
        // real value kept
        assert_eq!(row.text(CanonicalField::Colour), "Red");
        // placeholder replaced
        assert_eq!(row.get(CanonicalField::Width), &Cell::Number(300.0));
        // blank answers ignored
        assert_eq!(row.get(CanonicalField::Material), &Cell::Missing);
    }

    #[test]
    fn test_merge_is_idempotent_for_real_values() {
        let mut row = product(&[(CanonicalField::Finish, Cell::text("Satin"))]);
        let mut partial = PartialProduct::new();
        partial.set(CanonicalField::Finish, Cell::text("Gloss"));

        merge_enrichment(&mut row, &partial);
        let once = row.clone();
        merge_enrichment(&mut row, &partial);
        assert_eq!(row, once);
        assert_eq!(row.text(CanonicalField::Finish), "Satin");
    }

    #[test]
    fn test_empty_partial_changes_nothing() {
        let mut row = product(&[(CanonicalField::ProductName, Cell::text("Chair"))]);
        let before = row.clone();
        merge_enrichment(&mut row, &PartialProduct::new());
        assert_eq!(row, before);
    }

    #[tokio::test]
    async fn test_extract_batch_is_bounded() {
        let extractor = MockExtractor::new();
        let texts: Vec<String> = (0..12).map(|i| format!("product_name: P{}", i)).collect();

        let results = extract_batch(&extractor, texts.clone(), 3).await;

        assert_eq!(results.len(), 12);
        assert!(texts.iter().all(|t| results[t].is_ok()));
        assert!(extractor.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_enrich_products_dedups_and_degrades() {
        let extractor = MockExtractor::new();
        let mut products = vec![
            product(&[(CanonicalField::ProductName, Cell::text("Chair"))]),
            product(&[(CanonicalField::ProductName, Cell::text("Chair"))]),
            product(&[
                (CanonicalField::ProductName, Cell::text("FAIL desk")),
                (CanonicalField::Qty, Cell::text("0")),
                (CanonicalField::Width, Cell::Number(1200.0)),
            ]),
            ProductRow::new(),
        ];

        let warnings = enrich_products(&mut products, &extractor, 5).await;

        // Two unique blobs, the empty product sends nothing
        assert_eq!(extractor.calls.lock().unwrap().len(), 2);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("FAIL desk"));

        assert_eq!(products[0].text(CanonicalField::Brand), "Polytec");
        assert_eq!(products[1].text(CanonicalField::Colour), "Satin White");
        // Failed blob: text kept, placeholder qty takes its default
        assert_eq!(products[2].get(CanonicalField::Brand), &Cell::Missing);
        assert_eq!(products[2].text(CanonicalField::ProductName), "FAIL desk");
        assert_eq!(products[2].get(CanonicalField::Qty), &Cell::Number(1.0));
        assert_eq!(products[2].get(CanonicalField::Width), &Cell::Number(1200.0));
        assert_eq!(products[3].get(CanonicalField::Brand), &Cell::Missing);
    }

    #[tokio::test]
    async fn test_enrich_without_text_skips_calls() {
        let extractor = MockExtractor::new();
        let mut products = vec![product(&[(CanonicalField::Width, Cell::Number(600.0))])];
        let warnings = enrich_products(&mut products, &extractor, 5).await;
        assert!(warnings.is_empty());
        assert!(extractor.calls.lock().unwrap().is_empty());
    }
}
