//! Prompt generation for product extraction and header mapping
//!
//! The extraction prompt embeds the product record schema so the model
//! answers with exactly the fields the pipeline knows.

use crate::models::CanonicalField;

/// The product record JSON schema (embedded at compile time)
const PRODUCT_SCHEMA: &str = include_str!("../../schemas/product-record.json");

/// Generate the system prompt for product extraction
pub fn extraction_system_prompt() -> String {
    format!(
        r#"You are an expert extractor of structured product data from unstructured architectural schedules. Always be deterministic, schema-faithful, and explicit when inferring missing values. Never include personal or contact details in fields not intended for them.

## CRITICAL: Output Format

You MUST return ONLY a JSON object matching this schema:

```json
{product_schema}
```

## Rules

1. BRAND: Extract ONLY the manufacturer name (e.g., "Polytec"). Remove addresses, websites, phone numbers and contact names.
2. PRODUCT_NAME: Identify the most accurate product name using product type, description, model prefix or code (e.g., "Iconic Carpet 50/2833"). Details can also be found in the description.
3. PRODUCT_DESCRIPTION: A professional one-sentence summary (max 12 words). Avoid technical jargon (e.g., "A premium wool-blend carpet designed for luxury residential spaces").
4. PRODUCT_DETAILS: Format warranty, notes and installation info as a semicolon-separated list (e.g., "Warranty: 15 years; Note: TO BE INSTALLED IN ACCORDANCE WITH AS/NZS 2455.1:2007").
5. COLOUR/FINISH/MATERIAL: Be specific. If it is a "Gold Scheme" or has a "Satin" finish, capture that accurately. Material can describe the composition of the product.
6. DIMENSIONS: Convert to millimetres. "3.66m" -> 3660.
7. QTY/RRP: Extract the numbers. Remove currency symbols for RRP ("$150" -> 150.0).

If a value is missing: use an empty string for text fields and 0 for numbers.

## Example Output

```json
{{
  "doc_code": "L1",
  "product_name": "Minimalist Pendant Light",
  "brand": "Lighting Co",
  "colour": "Black",
  "finish": "Brushed Brass",
  "material": "Metal",
  "width": 300,
  "length": 300,
  "height": 600,
  "qty": 1,
  "rrp": 489.0,
  "feature_image": "blackpendantlight.jpg",
  "product_description": "A simple pendant light ideal for modern interiors.",
  "product_details": "Install at 2.4m height; supplied with dimmable bulb."
}}
```

Return ONLY the JSON object, no explanations."#,
        product_schema = PRODUCT_SCHEMA
    )
}

/// Generate the user prompt for one product text block
pub fn extraction_user_prompt(text: &str) -> String {
    format!("Extract from:\n{}", text)
}

/// Generate the system prompt for header mapping
pub fn header_mapping_system_prompt() -> String {
    let fields = CanonicalField::ALL
        .iter()
        .filter(|f| **f != CanonicalField::FeatureImage)
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are an expert at mapping messy spreadsheet headers to a canonical product schema.

The canonical fields are: {fields}.

Map the provided raw headers to these canonical names. Only include mappings you are confident about. Use the raw header text exactly as given.

Return ONLY a JSON object of the form:

{{"mapping": {{"<canonical field>": "<raw header>"}}}}"#
    )
}

/// Generate the user prompt listing the raw headers
pub fn header_mapping_user_prompt(headers: &[String]) -> String {
    format!("Raw headers: {}", headers.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_extraction_prompt_contains_schema() {
        let prompt = extraction_system_prompt();
        assert!(prompt.contains("\"product_details\""));
        assert!(prompt.contains("semicolon-separated"));
        assert!(prompt.contains("\"rrp\": 489.0"));
    }

    #[test]
    fn test_header_prompt_lists_fields() {
        let prompt = header_mapping_system_prompt();
        assert!(prompt.contains("doc_code, product_name, brand"));
        assert!(!prompt.contains("feature_image"));
        assert!(prompt.contains("\"mapping\""));
    }

    #[test]
    fn test_user_prompts_include_input() {
        let headers = vec!["Ref".to_string(), "Maker".to_string()];
        assert_eq!(header_mapping_user_prompt(&headers), "Raw headers: Ref, Maker");
        assert!(extraction_user_prompt("brand: Polytec").ends_with("brand: Polytec"));
    }

    #[test]
    fn test_product_schema_is_valid_json() {
        let schema: Value = serde_json::from_str(PRODUCT_SCHEMA).expect("Schema should be valid JSON");
        assert!(schema.get("properties").is_some());
    }
}
