//! Core domain types for galleryforge runs.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The 78-character line that separates code sections in an artifact body
/// and in published gallery files.
pub const SECTION_MARKER: &str =
    "##############################################################################";

/// Text inserted between two code sections of an artifact body.
pub fn section_break() -> String {
    format!("\n\n{SECTION_MARKER}\n# \n\n")
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Source descriptors
// ---------------------------------------------------------------------------

/// How a documentation source renders its examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Rendered example pages (one example per page, several code blocks).
    Gallery,
    /// Rendered notebook exports (code cells interleaved with output cells).
    Notebook,
    /// Ordinary documentation pages with no example structure.
    PlainDoc,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gallery => "gallery",
            Self::Notebook => "notebook",
            Self::PlainDoc => "plain_doc",
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream documentation source. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique key (e.g. `sunpy`).
    pub name: String,
    /// Root address of the documentation site.
    pub base_location: String,
    /// Extraction format.
    pub format_kind: FormatKind,
    /// Ordered glob patterns matched against discovered document paths.
    #[serde(default)]
    pub locator_patterns: Vec<String>,
    /// Index pages to scan for document links (documents themselves for `plain_doc`).
    #[serde(default)]
    pub entry_points: Vec<String>,
    /// Lower is scraped first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Short human description.
    #[serde(default)]
    pub description: String,
    /// Upstream repository, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

fn default_priority() -> i32 {
    1
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Gallery category inferred from an artifact's origin address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Maps,
    TimeSeries,
    Plotting,
    DataAcquisition,
    Coordinates,
    Basic,
    Diagnostics,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maps => "maps",
            Self::TimeSeries => "time_series",
            Self::Plotting => "plotting",
            Self::DataAcquisition => "data_acquisition",
            Self::Coordinates => "coordinates",
            Self::Basic => "basic",
            Self::Diagnostics => "diagnostics",
            Self::General => "general",
        }
    }

    /// All labels, in the order they are offered to the transformation service.
    pub const ALL: [Category; 8] = [
        Self::Maps,
        Self::TimeSeries,
        Self::Plotting,
        Self::DataAcquisition,
        Self::Coordinates,
        Self::Basic,
        Self::Diagnostics,
        Self::General,
    ];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CandidateArtifact
// ---------------------------------------------------------------------------

/// One extracted code unit prior to enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateArtifact {
    pub title: String,
    pub description: String,
    /// Raw code, sections joined with [`section_break`].
    pub body: String,
    /// Name of the owning [`SourceDescriptor`].
    pub source_name: String,
    /// Address the artifact was extracted from.
    pub origin_location: String,
    pub category: Category,
    pub dependencies: BTreeSet<String>,
    pub generates_visual_output: bool,
    pub extracted_at: DateTime<Utc>,
    /// SHA-256 of `body`, hex encoded.
    pub fingerprint: String,
}

impl CandidateArtifact {
    /// Build an artifact with default category and no dependencies; the
    /// inference pass fills those in.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
        source_name: impl Into<String>,
        origin_location: impl Into<String>,
        generates_visual_output: bool,
    ) -> Self {
        let body = body.into();
        let fingerprint = content_hash(&body);
        Self {
            title: title.into(),
            description: description.into(),
            body,
            source_name: source_name.into(),
            origin_location: origin_location.into(),
            category: Category::General,
            dependencies: BTreeSet::new(),
            generates_visual_output,
            extracted_at: Utc::now(),
            fingerprint,
        }
    }

    /// Override the category (e.g. `plain_doc` artifacts are always `basic`).
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }
}

/// Compute the SHA-256 hash of some text as lowercase hex.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Enrichment results
// ---------------------------------------------------------------------------

/// Why an enrichment call did not produce a parsed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The request never produced a response (connection, DNS, TLS...).
    #[error("transport failure: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Service { status: u16, body: String },
    /// The call exceeded its time bound.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The reply had no usable structured block.
    #[error("unparseable reply: {0}")]
    Unparseable(String),
    /// The task running the call panicked or was cancelled.
    #[error("task aborted: {0}")]
    TaskAborted(String),
}

impl FailureReason {
    /// Stable label used as the summary histogram key.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Service { .. } => "service",
            Self::Timeout(_) => "timeout",
            Self::Unparseable(_) => "unparseable",
            Self::TaskAborted(_) => "task_aborted",
        }
    }
}

/// Output of enrichment for one candidate, paired with it by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub revised_body: String,
    pub revised_title: String,
    pub revised_description: String,
    /// Category as returned by the service (may differ from the inferred one).
    pub category: String,
    /// Passed through verbatim; consumers must clamp before use.
    pub confidence: f64,
    pub warnings: Vec<String>,
    pub notes: String,
    /// Set only on fallback results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl EnrichmentResult {
    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_marker_is_78_hashes() {
        assert_eq!(SECTION_MARKER.len(), 78);
        assert!(SECTION_MARKER.chars().all(|c| c == '#'));
        assert!(section_break().contains(SECTION_MARKER));
    }

    #[test]
    fn candidate_fingerprint_tracks_body() {
        let a = CandidateArtifact::new("t", "d", "import numpy", "sunpy", "https://x/a", true);
        let b = CandidateArtifact::new("other", "", "import numpy", "sunpy", "https://x/b", false);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
        assert_eq!(a.category, Category::General);
        assert!(a.dependencies.is_empty());
    }

    #[test]
    fn format_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FormatKind::PlainDoc).unwrap();
        assert_eq!(json, r#""plain_doc""#);
        let parsed: FormatKind = serde_json::from_str(r#""notebook""#).unwrap();
        assert_eq!(parsed, FormatKind::Notebook);
    }

    #[test]
    fn category_labels() {
        let labels: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            labels,
            [
                "maps",
                "time_series",
                "plotting",
                "data_acquisition",
                "coordinates",
                "basic",
                "diagnostics",
                "general"
            ]
        );
    }

    #[test]
    fn failure_reason_kinds() {
        assert_eq!(FailureReason::Timeout(Duration::from_secs(3)).kind(), "timeout");
        let reason = FailureReason::Service {
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(reason.kind(), "service");
        assert!(reason.to_string().contains("429"));
    }

    #[test]
    fn enrichment_result_roundtrip_keeps_failure() {
        let result = EnrichmentResult {
            revised_body: "x = 1".into(),
            revised_title: "T".into(),
            revised_description: "D".into(),
            category: "general".into(),
            confidence: 0.1,
            warnings: vec!["w".into()],
            notes: String::new(),
            failure: Some(FailureReason::Unparseable("no json block".into())),
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: EnrichmentResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
        assert!(parsed.is_fallback());
    }
}
