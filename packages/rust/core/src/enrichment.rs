//! Enrichment coordinator.
//!
//! Sends every candidate through the [`TransformService`] in batches of at
//! most `max_concurrent`, spacing dispatches within a batch, and returns one
//! [`EnrichmentResult`] per candidate in input order. Failures never escape:
//! each is collapsed into a fallback result that keeps the original content.

use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, info, info_span, instrument, warn};

use galleryforge_shared::{CandidateArtifact, EnrichmentResult, EnrichmentSettings, FailureReason};

use crate::prompt::{ParsedReply, parse_reply};
use crate::service::{EnrichmentRequest, TransformService};

/// The single warning attached to every fallback result.
pub const FALLBACK_WARNING: &str = "enrichment failed — original content retained";

/// Confidence of a fallback after a failed or unparseable call.
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Confidence of a fallback after the call's task itself died.
pub const ABORTED_CONFIDENCE: f64 = 0.0;

const FALLBACK_NOTES: &str = "Original content retained";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Batching and timing for one enrichment pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentConfig {
    /// Batch size; also the bound on calls in flight.
    pub max_concurrent: usize,
    /// Minimum gap between two dispatches in the same batch.
    pub dispatch_spacing: Duration,
    /// Bound on each service call.
    pub call_timeout: Duration,
}

impl From<&EnrichmentSettings> for EnrichmentConfig {
    fn from(settings: &EnrichmentSettings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent,
            dispatch_spacing: Duration::from_millis(settings.dispatch_spacing_ms),
            call_timeout: Duration::from_secs(settings.call_timeout_secs),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self::from(&EnrichmentSettings::default())
    }
}

// ---------------------------------------------------------------------------
// Call outcome
// ---------------------------------------------------------------------------

/// What one service call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Success(EnrichmentResult),
    Failure(FailureReason),
}

impl CallOutcome {
    /// Resolve to the result paired with `original`. This is the only place a
    /// failure becomes a fallback result.
    pub fn into_result(self, original: &CandidateArtifact) -> EnrichmentResult {
        match self {
            Self::Success(result) => result,
            Self::Failure(reason) => {
                let confidence = match reason {
                    FailureReason::TaskAborted(_) => ABORTED_CONFIDENCE,
                    _ => FALLBACK_CONFIDENCE,
                };
                EnrichmentResult {
                    revised_body: original.body.clone(),
                    revised_title: original.title.clone(),
                    revised_description: original.description.clone(),
                    category: original.category.as_str().to_string(),
                    confidence,
                    warnings: vec![FALLBACK_WARNING.to_string()],
                    notes: FALLBACK_NOTES.to_string(),
                    failure: Some(reason),
                }
            }
        }
    }
}

/// Issue one call under the time bound and parse its reply.
async fn call_service(
    service: Arc<dyn TransformService>,
    request: EnrichmentRequest,
    timeout: Duration,
) -> CallOutcome {
    match tokio::time::timeout(timeout, service.transform(&request)).await {
        Err(_) => CallOutcome::Failure(FailureReason::Timeout(timeout)),
        Ok(Err(reason)) => CallOutcome::Failure(reason),
        Ok(Ok(reply)) => match parse_reply(&reply, &request) {
            ParsedReply::Parsed(result) => CallOutcome::Success(result),
            ParsedReply::Unparseable(why) => CallOutcome::Failure(FailureReason::Unparseable(why)),
        },
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for enrichment.
pub trait EnrichmentProgress: Send + Sync {
    /// Called once per artifact as its result is collected.
    fn task_progress(&self, current: usize, total: usize, detail: &str);
}

/// No-op progress reporter.
pub struct SilentEnrichmentProgress;

impl EnrichmentProgress for SilentEnrichmentProgress {
    fn task_progress(&self, _current: usize, _total: usize, _detail: &str) {}
}

// ---------------------------------------------------------------------------
// Batch coordinator
// ---------------------------------------------------------------------------

/// Enrich every artifact. Same length and order as `artifacts`; never fails.
pub async fn enrich_batch(
    service: Arc<dyn TransformService>,
    artifacts: &[CandidateArtifact],
    config: &EnrichmentConfig,
) -> Vec<EnrichmentResult> {
    enrich_batch_with_progress(service, artifacts, config, &SilentEnrichmentProgress).await
}

/// [`enrich_batch`] with a progress callback.
///
/// Batch *i* is fully joined before batch *i + 1* dispatches anything, so at
/// most `max_concurrent` calls are ever outstanding. Results are matched by
/// position within the batch, not completion order.
#[instrument(skip_all, fields(artifacts = artifacts.len(), max_concurrent = config.max_concurrent))]
pub async fn enrich_batch_with_progress(
    service: Arc<dyn TransformService>,
    artifacts: &[CandidateArtifact],
    config: &EnrichmentConfig,
    progress: &dyn EnrichmentProgress,
) -> Vec<EnrichmentResult> {
    let total = artifacts.len();
    let batch_size = config.max_concurrent.max(1);
    let mut results = Vec::with_capacity(total);
    let mut fallbacks = 0usize;

    for (batch_index, batch) in artifacts.chunks(batch_size).enumerate() {
        debug!(batch = batch_index, size = batch.len(), "dispatching batch");

        let mut handles = Vec::with_capacity(batch.len());
        for (offset, artifact) in batch.iter().enumerate() {
            if offset > 0 {
                tokio::time::sleep(config.dispatch_spacing).await;
            }
            let service = Arc::clone(&service);
            let request = EnrichmentRequest::from(artifact);
            let timeout = config.call_timeout;
            let span = info_span!(
                "enrich_call",
                title = %artifact.title,
                source = %artifact.source_name
            );
            handles.push(tokio::spawn(call_service(service, request, timeout).instrument(span)));
        }

        for (handle, artifact) in handles.into_iter().zip(batch) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => CallOutcome::Failure(FailureReason::TaskAborted(e.to_string())),
            };

            if let CallOutcome::Failure(reason) = &outcome {
                warn!(
                    title = %artifact.title,
                    source = %artifact.source_name,
                    reason = %reason,
                    "enrichment failed, keeping original content"
                );
                fallbacks += 1;
            }

            results.push(outcome.into_result(artifact));
            progress.task_progress(results.len(), total, &artifact.title);
        }
    }

    info!(enriched = results.len(), fallbacks, "enrichment complete");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn artifact(title: &str) -> CandidateArtifact {
        CandidateArtifact::new(
            title,
            format!("{title} description"),
            format!("print('{title}')"),
            "alpha",
            format!("https://alpha.example.org/gallery/{title}.html"),
            true,
        )
    }

    fn reply(title: &str, confidence: f64) -> String {
        format!(
            "```json\n{}\n```",
            serde_json::json!({
                "improved_title": format!("{title} (improved)"),
                "confidence_score": confidence,
                "warnings": [],
            })
        )
    }

    fn fast_config(max_concurrent: usize) -> EnrichmentConfig {
        EnrichmentConfig {
            max_concurrent,
            dispatch_spacing: Duration::ZERO,
            call_timeout: Duration::from_secs(5),
        }
    }

    /// Records the high-water mark of concurrent calls.
    #[derive(Default)]
    struct CountingService {
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TransformService for CountingService {
        async fn transform(&self, request: &EnrichmentRequest) -> Result<String, FailureReason> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(reply(&request.title, 0.9))
        }
    }

    /// Later artifacts answer first; fails or stalls on marked titles.
    struct ScriptedService;

    #[async_trait]
    impl TransformService for ScriptedService {
        async fn transform(&self, request: &EnrichmentRequest) -> Result<String, FailureReason> {
            match request.title.as_str() {
                "refused" => Err(FailureReason::Service {
                    status: 503,
                    body: "overloaded".into(),
                }),
                "garbled" => Ok("Sorry, I cannot produce JSON today.".into()),
                "stalled" => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(reply("stalled", 0.9))
                }
                "boom" => panic!("service crashed"),
                title => {
                    let n: u64 = title.trim_start_matches('a').parse().unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(n * 10))).await;
                    Ok(reply(title, 0.8))
                }
            }
        }
    }

    /// Records the span each call runs in.
    #[derive(Default)]
    struct SpanService {
        spans: std::sync::Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl TransformService for SpanService {
        async fn transform(&self, request: &EnrichmentRequest) -> Result<String, FailureReason> {
            let name = tracing::Span::current()
                .metadata()
                .map(|m| m.name().to_string());
            self.spans.lock().unwrap().push(name);
            Ok(reply(&request.title, 0.9))
        }
    }

    #[tokio::test]
    async fn calls_run_inside_a_span() {
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry());
        let service = Arc::new(SpanService::default());
        let artifacts = vec![artifact("a0"), artifact("a1")];

        enrich_batch(service.clone(), &artifacts, &fast_config(2)).await;

        let spans = service.spans.lock().unwrap();
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|s| s.as_deref() == Some("enrich_call")));
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_bound() {
        let service = Arc::new(CountingService::default());
        let artifacts: Vec<_> = (0..8).map(|i| artifact(&format!("a{i}"))).collect();

        let results = enrich_batch(service.clone(), &artifacts, &fast_config(3)).await;

        assert_eq!(results.len(), 8);
        assert_eq!(service.calls.load(Ordering::SeqCst), 8);
        let high = service.high_water.load(Ordering::SeqCst);
        assert!(high <= 3, "high-water mark {high} exceeded max_concurrent");
        assert!(high >= 2, "calls within a batch should overlap");
    }

    #[tokio::test]
    async fn single_slot_serializes_calls() {
        let service = Arc::new(CountingService::default());
        let artifacts: Vec<_> = (0..4).map(|i| artifact(&format!("a{i}"))).collect();

        enrich_batch(service.clone(), &artifacts, &fast_config(1)).await;
        assert_eq!(service.high_water.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let artifacts: Vec<_> = (0..4).map(|i| artifact(&format!("a{i}"))).collect();
        let results = enrich_batch(Arc::new(ScriptedService), &artifacts, &fast_config(4)).await;

        let titles: Vec<&str> = results.iter().map(|r| r.revised_title.as_str()).collect();
        assert_eq!(
            titles,
            ["a0 (improved)", "a1 (improved)", "a2 (improved)", "a3 (improved)"]
        );
    }

    #[tokio::test]
    async fn failures_fall_back_without_aborting_the_batch() {
        let artifacts = vec![
            artifact("a1"),
            artifact("refused"),
            artifact("garbled"),
            artifact("a2"),
        ];
        let results = enrich_batch(Arc::new(ScriptedService), &artifacts, &fast_config(2)).await;

        assert_eq!(results.len(), 4);
        assert!(!results[0].is_fallback());
        assert!(!results[3].is_fallback());

        for (result, original) in results[1..3].iter().zip(&artifacts[1..3]) {
            assert_eq!(result.revised_title, original.title);
            assert_eq!(result.revised_description, original.description);
            assert_eq!(result.revised_body, original.body);
            assert_eq!(result.confidence, FALLBACK_CONFIDENCE);
            assert_eq!(result.warnings, vec![FALLBACK_WARNING.to_string()]);
        }
        assert_eq!(results[1].failure.as_ref().map(FailureReason::kind), Some("service"));
        assert_eq!(results[2].failure.as_ref().map(FailureReason::kind), Some("unparseable"));
    }

    #[tokio::test]
    async fn slow_calls_time_out_into_fallbacks() {
        let config = EnrichmentConfig {
            call_timeout: Duration::from_millis(50),
            ..fast_config(2)
        };
        let artifacts = vec![artifact("stalled"), artifact("a1")];
        let results = enrich_batch(Arc::new(ScriptedService), &artifacts, &config).await;

        assert_eq!(
            results[0].failure,
            Some(FailureReason::Timeout(Duration::from_millis(50)))
        );
        assert_eq!(results[0].revised_title, "stalled");
        assert!(!results[1].is_fallback());
    }

    #[tokio::test]
    async fn panicking_call_is_contained() {
        let artifacts = vec![artifact("boom"), artifact("a1"), artifact("a2")];
        let results = enrich_batch(Arc::new(ScriptedService), &artifacts, &fast_config(1)).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].confidence, ABORTED_CONFIDENCE);
        assert_eq!(results[0].revised_body, artifacts[0].body);
        assert_eq!(results[0].warnings.len(), 1);
        assert_eq!(results[0].failure.as_ref().map(FailureReason::kind), Some("task_aborted"));
        assert!(!results[1].is_fallback());
        assert!(!results[2].is_fallback());
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let service = Arc::new(CountingService::default());
        let results = enrich_batch(service.clone(), &[], &fast_config(3)).await;
        assert!(results.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dispatches_are_spaced_within_a_batch() {
        let service = Arc::new(CountingService::default());
        let artifacts: Vec<_> = (0..3).map(|i| artifact(&format!("a{i}"))).collect();
        let config = EnrichmentConfig {
            dispatch_spacing: Duration::from_millis(40),
            ..fast_config(3)
        };

        let start = std::time::Instant::now();
        enrich_batch(service, &artifacts, &config).await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn config_from_settings() {
        let config = EnrichmentConfig::default();
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.dispatch_spacing, Duration::from_secs(1));
        assert_eq!(config.call_timeout, Duration::from_secs(120));
    }

    #[test]
    fn success_passes_through_verbatim() {
        let original = artifact("a1");
        let result = EnrichmentResult {
            revised_body: "x".into(),
            revised_title: "y".into(),
            revised_description: "z".into(),
            category: "plotting".into(),
            confidence: -1.0,
            warnings: vec!["w".into()],
            notes: "n".into(),
            failure: None,
        };
        assert_eq!(CallOutcome::Success(result.clone()).into_result(&original), result);
    }
}
