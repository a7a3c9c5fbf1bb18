//! Per-source extraction: discover documents, fetch them, run the extractor.

use std::collections::HashSet;

use galleryforge_shared::{CandidateArtifact, ExtractionSettings, FormatKind, Result, SourceDescriptor};
use scraper::Html;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::extractors::extractor_for;
use crate::source::DocumentSource;

/// Ceiling on candidates collected from one source, per format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    pub gallery: usize,
    pub notebook: usize,
    pub plain_doc: usize,
}

impl ExtractionLimits {
    pub fn cap_for(&self, kind: FormatKind) -> usize {
        match kind {
            FormatKind::Gallery => self.gallery,
            FormatKind::Notebook => self.notebook,
            FormatKind::PlainDoc => self.plain_doc,
        }
    }
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self::from(&ExtractionSettings::default())
    }
}

impl From<&ExtractionSettings> for ExtractionLimits {
    fn from(settings: &ExtractionSettings) -> Self {
        Self {
            gallery: settings.gallery_cap,
            notebook: settings.notebook_cap,
            plain_doc: settings.plain_doc_cap,
        }
    }
}

/// Extract candidates from one source, in discovery order, up to the cap.
///
/// Only discovery failure is an error. Unreachable documents, non-success
/// statuses and documents without code are skipped, as are bodies already
/// seen under another address of the same source.
#[instrument(skip_all, fields(source = %source.name, kind = %source.format_kind))]
pub async fn extract_source(
    source: &SourceDescriptor,
    documents: &dyn DocumentSource,
    limits: &ExtractionLimits,
) -> Result<Vec<CandidateArtifact>> {
    let cap = limits.cap_for(source.format_kind);
    let addresses = documents.discover(source).await?;
    debug!(documents = addresses.len(), cap, "discovered documents");

    let mut candidates = Vec::new();
    let mut seen = HashSet::new();

    for address in addresses {
        if candidates.len() >= cap {
            break;
        }

        let page = match documents.fetch(&address).await {
            Ok(page) => page,
            Err(e) => {
                warn!(%address, error = %e, "document unavailable");
                continue;
            }
        };

        if !page.is_success() {
            debug!(%address, status = page.status, "skipping non-success document");
            continue;
        }

        let found = extract_document(&page.body, source, &address);
        if found.is_empty() {
            debug!(%address, "document has no code");
        }
        for artifact in found {
            if seen.insert(artifact.fingerprint.clone()) {
                candidates.push(artifact);
            } else {
                debug!(%address, "duplicate body");
            }
        }
    }

    candidates.truncate(cap);
    info!(candidates = candidates.len(), "source extracted");
    Ok(candidates)
}

/// Parse and extract synchronously; the parsed tree never crosses an await.
pub fn extract_document(
    body: &str,
    source: &SourceDescriptor,
    address: &Url,
) -> Vec<CandidateArtifact> {
    let doc = Html::parse_document(body);
    extractor_for(source.format_kind).extract(&doc, source, address)
}
