//! Inclusion policy: which enriched artifacts get published.

use serde::Serialize;

use galleryforge_shared::{CandidateArtifact, EnrichmentResult, PolicySettings};

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionRule {
    HighConfidence,
    MinimalCoverage,
    RecencyKeyword,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionDecision {
    pub publish: bool,
    pub rule: InclusionRule,
}

/// Untrusted confidence mapped into `[0, 1]`; NaN counts as zero.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Deterministic publish rules, evaluated in fixed precedence.
#[derive(Debug, Clone)]
pub struct InclusionPolicy {
    threshold: f64,
    min_per_source: usize,
    keywords: Vec<String>,
}

impl InclusionPolicy {
    pub fn new(settings: &PolicySettings) -> Self {
        Self {
            threshold: settings.confidence_threshold,
            min_per_source: settings.min_per_source,
            keywords: settings
                .recency_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    /// Decide for one artifact given how many from its source are already
    /// published. The first matching rule wins.
    pub fn decide(
        &self,
        result: &EnrichmentResult,
        _artifact: &CandidateArtifact,
        existing_count_for_source: usize,
    ) -> InclusionDecision {
        let rule = if clamp_confidence(result.confidence) > self.threshold {
            InclusionRule::HighConfidence
        } else if existing_count_for_source < self.min_per_source {
            InclusionRule::MinimalCoverage
        } else if self.has_recency_keyword(&result.revised_title) {
            InclusionRule::RecencyKeyword
        } else {
            InclusionRule::Rejected
        };

        InclusionDecision {
            publish: rule != InclusionRule::Rejected,
            rule,
        }
    }

    pub fn should_publish(
        &self,
        result: &EnrichmentResult,
        artifact: &CandidateArtifact,
        existing_count_for_source: usize,
    ) -> bool {
        self.decide(result, artifact, existing_count_for_source).publish
    }

    fn has_recency_keyword(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        Self::new(&PolicySettings::default())
    }
}

/// [`InclusionPolicy::should_publish`] with the default thresholds.
pub fn should_publish(
    result: &EnrichmentResult,
    artifact: &CandidateArtifact,
    existing_count_for_source: usize,
) -> bool {
    InclusionPolicy::default().should_publish(result, artifact, existing_count_for_source)
}
