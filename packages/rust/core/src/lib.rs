//! Core pipeline logic for galleryforge.
//!
//! Enrichment through the transformation service, the inclusion policy,
//! gallery output, run summaries, and the orchestrator tying them together.

pub mod enrichment;
pub mod pipeline;
pub mod policy;
pub mod prompt;
pub mod publish;
pub mod service;
pub mod summary;

pub use enrichment::{
    ABORTED_CONFIDENCE, CallOutcome, EnrichmentConfig, EnrichmentProgress, FALLBACK_CONFIDENCE,
    FALLBACK_WARNING, SilentEnrichmentProgress, enrich_batch, enrich_batch_with_progress,
};
pub use pipeline::{PipelineConfig, PipelineRun, ProgressReporter, SilentProgress, run_pipeline};
pub use policy::{InclusionDecision, InclusionPolicy, InclusionRule, clamp_confidence, should_publish};
pub use prompt::{ParsedReply, parse_reply, render_prompt};
pub use publish::{
    GalleryFile, PublishReport, Publisher, README_FILE, REQUIREMENTS_FILE, SUMMARY_FILE,
    gallery_filename, render_gallery_file, slugify,
};
pub use service::{EnrichmentRequest, MessagesService, TransformService};
pub use summary::{DecisionRecord, PipelineSummary, SourceCounts, SummaryInput};
