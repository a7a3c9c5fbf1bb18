//! Dependency and category inference over artifact text and addresses.
//!
//! Everything here is pure: the same input always gives the same output.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use galleryforge_shared::{CandidateArtifact, Category};
use regex::Regex;
use url::Url;

static IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:from\s+(\S+)|import\s+(\S+))").unwrap());

/// Substring rules applied to the lower-cased address path. First match wins,
/// so the order here is part of the behavior.
const CATEGORY_RULES: [(&str, Category); 7] = [
    ("map", Category::Maps),
    ("time", Category::TimeSeries),
    ("plot", Category::Plotting),
    ("data", Category::DataAcquisition),
    ("coord", Category::Coordinates),
    ("getting_started", Category::Basic),
    ("diagnostic", Category::Diagnostics),
];

/// Top-level package names imported by `body`.
///
/// A line contributes when, after leading whitespace, it starts with
/// `from <id>` or `import <id>`; the first dot segment of `<id>` is kept.
pub fn infer_dependencies(body: &str) -> BTreeSet<String> {
    body.lines()
        .filter_map(|line| {
            let caps = IMPORT_LINE.captures(line.trim())?;
            let id = caps.get(1).or_else(|| caps.get(2))?.as_str();
            let top = id.split('.').next()?.trim_end_matches(',');
            (!top.is_empty()).then(|| top.to_string())
        })
        .collect()
}

/// Category label for an origin address.
///
/// Rules run on the URL path when the address parses, otherwise on the raw
/// string, so host names never influence the result.
pub fn infer_category(address: &str) -> Category {
    let haystack = match Url::parse(address) {
        Ok(url) => url.path().to_lowercase(),
        Err(_) => address.to_lowercase(),
    };

    CATEGORY_RULES
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map(|(_, category)| *category)
        .unwrap_or(Category::General)
}

/// Fill in inferred dependencies, and the category unless the extractor
/// already fixed one.
pub fn annotate(artifact: &mut CandidateArtifact) {
    artifact.dependencies = infer_dependencies(&artifact.body);
    if artifact.category == Category::General {
        artifact.category = infer_category(&artifact.origin_location);
    }
}
