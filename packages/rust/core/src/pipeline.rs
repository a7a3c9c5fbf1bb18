//! End-to-end run: registry → extract → infer → enrich → decide → summarize.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, instrument};

use galleryforge_extract::{DocumentSource, ExtractionLimits, annotate, extract_source};
use galleryforge_shared::{
    AppConfig, CandidateArtifact, EnrichmentResult, GalleryError, Result, RunId, SourceRegistry,
};

use crate::enrichment::{EnrichmentConfig, EnrichmentProgress, enrich_batch_with_progress};
use crate::policy::{InclusionDecision, InclusionPolicy, InclusionRule};
use crate::publish::{GalleryFile, gallery_filename, render_gallery_file};
use crate::service::TransformService;
use crate::summary::{PipelineSummary, SummaryInput};

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub registry: SourceRegistry,
    pub limits: ExtractionLimits,
    pub enrichment: EnrichmentConfig,
    pub policy: InclusionPolicy,
    /// Date stamped into published file names.
    pub run_date: NaiveDate,
}

impl PipelineConfig {
    /// Validate `config` and resolve it. Fails before anything is fetched.
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: config.registry()?,
            limits: ExtractionLimits::from(&config.extraction),
            enrichment: EnrichmentConfig::from(&config.enrichment),
            policy: InclusionPolicy::new(&config.policy),
            run_date: Utc::now().date_naive(),
        })
    }
}

/// Output of one run. `candidates`, `results` and `decisions` are parallel.
#[derive(Debug)]
pub struct PipelineRun {
    pub candidates: Vec<CandidateArtifact>,
    pub results: Vec<EnrichmentResult>,
    pub decisions: Vec<InclusionDecision>,
    /// Rendered files for the published artifacts, in decision order.
    pub files: Vec<GalleryFile>,
    pub summary: PipelineSummary,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each source, with the number of candidates it produced.
    fn source_extracted(&self, source: &str, candidates: usize);
    /// Called as each enrichment result is collected.
    fn artifact_enriched(&self, current: usize, total: usize, title: &str);
    /// Called when the pipeline completes.
    fn done(&self, summary: &PipelineSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_extracted(&self, _source: &str, _candidates: usize) {}
    fn artifact_enriched(&self, _current: usize, _total: usize, _title: &str) {}
    fn done(&self, _summary: &PipelineSummary) {}
}

struct EnrichmentTicker<'a>(&'a dyn ProgressReporter);

impl EnrichmentProgress for EnrichmentTicker<'_> {
    fn task_progress(&self, current: usize, total: usize, detail: &str) {
        self.0.artifact_enriched(current, total, detail);
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run the full pipeline.
///
/// `existing` holds the number of already-published files per source; it
/// seeds the per-source counts the inclusion policy sees. Within the run a
/// source's count grows only with artifacts admitted by the minimal coverage
/// rule, so high-confidence publishes do not use up the coverage allowance.
/// Decisions are made in accumulation order.
///
/// A failing source is recorded in the summary and skipped. Only an unusable
/// configuration is an error, including a fatal error from extraction; the
/// run writes nothing, so aborting there leaves no partial output.
#[instrument(skip_all, fields(sources = config.registry.len()))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    documents: &dyn DocumentSource,
    service: Arc<dyn TransformService>,
    existing: &BTreeMap<String, usize>,
    progress: &dyn ProgressReporter,
) -> Result<PipelineRun> {
    if config.enrichment.max_concurrent == 0 {
        return Err(GalleryError::config(
            "enrichment.max_concurrent must be at least 1",
        ));
    }

    let run_id = RunId::new();
    let started_at = Utc::now();
    info!(%run_id, "starting pipeline run");

    // --- Phase 1: Extraction, in priority order ---
    progress.phase("Extracting examples");
    let mut candidates = Vec::new();
    let mut source_names = Vec::new();
    let mut skipped = BTreeMap::new();

    for source in config.registry.list_sources() {
        source_names.push(source.name.clone());

        match extract_source(source, documents, &config.limits).await {
            Ok(mut found) => {
                for artifact in &mut found {
                    annotate(artifact);
                }
                progress.source_extracted(&source.name, found.len());
                candidates.extend(found);
            }
            Err(e) if e.is_fatal() => {
                error!(source = %source.name, error = %e, "source unusable, aborting run");
                return Err(e);
            }
            Err(e) => {
                error!(source = %source.name, error = %e, "source extraction failed, skipping");
                progress.source_extracted(&source.name, 0);
                skipped.insert(source.name.clone(), e.to_string());
            }
        }
    }

    info!(
        candidates = candidates.len(),
        skipped = skipped.len(),
        "extraction complete"
    );

    // --- Phase 2: Enrichment ---
    progress.phase("Enriching examples");
    let results = enrich_batch_with_progress(
        service,
        &candidates,
        &config.enrichment,
        &EnrichmentTicker(progress),
    )
    .await;

    // --- Phase 3: Inclusion decisions, in accumulation order ---
    progress.phase("Selecting examples");
    let mut counts = existing.clone();
    let mut decisions = Vec::with_capacity(candidates.len());
    let mut files = Vec::new();

    for (index, (artifact, result)) in candidates.iter().zip(&results).enumerate() {
        let count = counts.entry(artifact.source_name.clone()).or_insert(0);
        let decision = config.policy.decide(result, artifact, *count);
        debug!(
            title = %result.revised_title,
            source = %artifact.source_name,
            existing = *count,
            rule = ?decision.rule,
            "inclusion decision"
        );

        if decision.rule == InclusionRule::MinimalCoverage {
            *count += 1;
        }
        if decision.publish {
            files.push(GalleryFile {
                filename: gallery_filename(
                    config.run_date,
                    &artifact.source_name,
                    index + 1,
                    &result.revised_title,
                ),
                source_name: artifact.source_name.clone(),
                contents: render_gallery_file(artifact, result),
            });
        }
        decisions.push(decision);
    }

    // --- Phase 4: Summary ---
    let summary = PipelineSummary::build(SummaryInput {
        run_id,
        started_at,
        source_names: &source_names,
        candidates: &candidates,
        results: &results,
        decisions: &decisions,
        skipped_sources: skipped,
    });

    info!(
        total_candidates = summary.total_candidates,
        total_published = summary.total_published,
        mean_confidence = summary.mean_confidence,
        "pipeline run complete"
    );
    progress.done(&summary);

    Ok(PipelineRun {
        candidates,
        results,
        decisions,
        files,
        summary,
    })
}
