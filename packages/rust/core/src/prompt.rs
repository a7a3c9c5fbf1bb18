//! Instruction template and reply parsing for the transformation service.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use galleryforge_shared::{Category, EnrichmentResult, SECTION_MARKER};

use crate::service::EnrichmentRequest;

/// Default confidence when the reply omits `confidence_score`.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Default notes when the reply omits `processing_notes`.
pub const DEFAULT_NOTES: &str = "Processed by transformation service";

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").unwrap());

/// Result of scanning a reply for its structured block.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Parsed(EnrichmentResult),
    Unparseable(String),
}

/// Render the full instruction for one artifact.
pub fn render_prompt(request: &EnrichmentRequest) -> String {
    let categories = Category::ALL
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are improving a Python code example for a community gallery of heliophysics packages. The gallery shows newcomers how to use each package.

CURRENT EXAMPLE:
Package: {source}
Title: {title}
Description: {description}
Category: {category}
Source URL: {origin}

CODE:
```python
{body}
```

TASK: revise this example to gallery standards.

1. Code quality:
   - Fix syntax errors and obvious bugs
   - Use clear variable names
   - Comment the key steps
   - Keep all imports at the top and remove duplicates
   - Drop dead or redundant code

2. Gallery format:
   - Alternate comment blocks and code blocks
   - Start each comment block with the line "{marker}"
   - Each comment block explains the code section that follows

3. Educational value:
   - Explain domain concepts briefly
   - Describe the key functions and methods used

4. Title and description:
   - A concise, descriptive title
   - A description of what the example demonstrates
   - One category from: {categories}

5. Dependencies:
   - Import every package the code needs
   - Warn about packages that may not be commonly installed

CONTENT CONTRACT:
- Do not add functionality that is not in the original
- Preserve the original purpose of the example
- The code must run on its own
- Keep plotting compatible with matplotlib

Respond with exactly one JSON block in this format:
```json
{{
    "improved_title": "Clear, descriptive title",
    "improved_description": "What the example demonstrates",
    "category": "one_category_name",
    "improved_code": "Complete improved Python code",
    "confidence_score": 0.85,
    "warnings": ["Dependency or compatibility concerns"],
    "processing_notes": "Short summary of the changes"
}}
```"#,
        source = request.source_name,
        title = request.title,
        description = request.description,
        category = request.category,
        origin = request.origin_location,
        body = request.body,
        marker = SECTION_MARKER,
    )
}

/// Extract the first fenced JSON block from `reply`.
///
/// Keys missing from the block fall back to the request's original values.
/// `confidence_score` is passed through without range checks.
pub fn parse_reply(reply: &str, original: &EnrichmentRequest) -> ParsedReply {
    let Some(caps) = JSON_BLOCK.captures(reply) else {
        return ParsedReply::Unparseable("no fenced json block in reply".into());
    };

    let value: Value = match serde_json::from_str(&caps[1]) {
        Ok(value) => value,
        Err(e) => return ParsedReply::Unparseable(format!("invalid json block: {e}")),
    };

    let Some(fields) = value.as_object() else {
        return ParsedReply::Unparseable("json block is not an object".into());
    };

    let warnings = fields
        .get("warnings")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ParsedReply::Parsed(EnrichmentResult {
        revised_body: string_field(fields, "improved_code", &original.body),
        revised_title: string_field(fields, "improved_title", &original.title),
        revised_description: string_field(fields, "improved_description", &original.description),
        category: string_field(fields, "category", &original.category),
        confidence: fields
            .get("confidence_score")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_CONFIDENCE),
        warnings,
        notes: string_field(fields, "processing_notes", DEFAULT_NOTES),
        failure: None,
    })
}

fn string_field(fields: &Map<String, Value>, key: &str, default: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}
