//! Run summary: the aggregate record emitted once per pipeline run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use galleryforge_shared::{CandidateArtifact, EnrichmentResult, RunId};

use crate::policy::{InclusionDecision, InclusionRule, clamp_confidence};

/// Candidate and published counts for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceCounts {
    pub candidates: usize,
    pub published: usize,
}

/// The inclusion decision for one candidate, as recorded in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    /// 1-based position in the run; matches the `NN` of a published file.
    pub index: usize,
    pub source: String,
    pub title: String,
    pub category: String,
    /// Clamped, as the policy saw it.
    pub confidence: f64,
    pub rule: InclusionRule,
    pub published: bool,
    pub warnings_count: usize,
    /// Failure kind when the result is a fallback.
    pub failure: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_candidates: usize,
    pub total_enriched: usize,
    pub total_published: usize,
    pub per_source: BTreeMap<String, SourceCounts>,
    /// Keyed by the category the service returned.
    pub per_category: BTreeMap<String, usize>,
    /// Mean of clamped confidences; 0 when nothing was enriched.
    pub mean_confidence: f64,
    pub warning_histogram: BTreeMap<String, usize>,
    /// Fallback counts keyed by failure kind.
    pub failure_reasons: BTreeMap<String, usize>,
    /// Package name to number of candidates importing it.
    pub dependencies: BTreeMap<String, usize>,
    /// Sources whose extraction failed, with the error.
    pub skipped_sources: BTreeMap<String, String>,
    /// One entry per candidate, in decision order.
    pub decisions: Vec<DecisionRecord>,
}

/// Everything a run produced, in accumulation order.
pub struct SummaryInput<'a> {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    /// Every source the run visited, including skipped ones.
    pub source_names: &'a [String],
    pub candidates: &'a [CandidateArtifact],
    pub results: &'a [EnrichmentResult],
    /// Inclusion decision per candidate.
    pub decisions: &'a [InclusionDecision],
    pub skipped_sources: BTreeMap<String, String>,
}

impl PipelineSummary {
    pub fn build(input: SummaryInput<'_>) -> Self {
        let mut per_source: BTreeMap<String, SourceCounts> = input
            .source_names
            .iter()
            .map(|name| (name.clone(), SourceCounts::default()))
            .collect();
        let mut per_category = BTreeMap::new();
        let mut warning_histogram = BTreeMap::new();
        let mut failure_reasons = BTreeMap::new();
        let mut dependencies = BTreeMap::new();

        for (index, candidate) in input.candidates.iter().enumerate() {
            let counts = per_source.entry(candidate.source_name.clone()).or_default();
            counts.candidates += 1;
            if input.decisions.get(index).is_some_and(|d| d.publish) {
                counts.published += 1;
            }
            for dep in &candidate.dependencies {
                *dependencies.entry(dep.clone()).or_insert(0) += 1;
            }
        }

        for result in input.results {
            *per_category.entry(result.category.clone()).or_insert(0) += 1;
            for warning in &result.warnings {
                *warning_histogram.entry(warning.clone()).or_insert(0) += 1;
            }
            if let Some(reason) = &result.failure {
                *failure_reasons.entry(reason.kind().to_string()).or_insert(0) += 1;
            }
        }

        let decisions = input
            .candidates
            .iter()
            .zip(input.results)
            .zip(input.decisions)
            .enumerate()
            .map(|(index, ((candidate, result), decision))| DecisionRecord {
                index: index + 1,
                source: candidate.source_name.clone(),
                title: result.revised_title.clone(),
                category: result.category.clone(),
                confidence: clamp_confidence(result.confidence),
                rule: decision.rule,
                published: decision.publish,
                warnings_count: result.warnings.len(),
                failure: result.failure.as_ref().map(|f| f.kind()),
            })
            .collect();

        let mean_confidence = if input.results.is_empty() {
            0.0
        } else {
            input
                .results
                .iter()
                .map(|r| clamp_confidence(r.confidence))
                .sum::<f64>()
                / input.results.len() as f64
        };

        Self {
            run_id: input.run_id,
            started_at: input.started_at,
            finished_at: Utc::now(),
            total_candidates: input.candidates.len(),
            total_enriched: input.results.len(),
            total_published: input.decisions.iter().filter(|d| d.publish).count(),
            per_source,
            per_category,
            mean_confidence,
            warning_histogram,
            failure_reasons,
            dependencies,
            skipped_sources: input.skipped_sources,
            decisions,
        }
    }
}
