//! Extractor for rendered example-gallery pages.

use std::sync::LazyLock;

use galleryforge_shared::{CandidateArtifact, FormatKind, SourceDescriptor};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::{FormatExtractor, code_or_self, first_heading, first_paragraph, join_sections, select_blocks};

static HIGHLIGHT_PYTHON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.highlight-python").unwrap());
static LITERAL_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("pre.literal-block").unwrap());

const DEFAULT_TITLE: &str = "Untitled Example";

/// One artifact per gallery page: every code block, in document order.
pub struct GalleryExtractor;

impl FormatExtractor for GalleryExtractor {
    fn extract(
        &self,
        doc: &Html,
        source: &SourceDescriptor,
        address: &Url,
    ) -> Vec<CandidateArtifact> {
        let parts: Vec<String> = select_blocks(doc, &[&*HIGHLIGHT_PYTHON, &*LITERAL_BLOCK])
            .into_iter()
            .map(code_or_self)
            .filter(|code| !code.is_empty())
            .collect();

        if parts.is_empty() {
            debug!(%address, "no code blocks on gallery page");
            return Vec::new();
        }

        let title = first_heading(doc).unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let description = first_paragraph(doc, |_| true).unwrap_or_default();

        vec![CandidateArtifact::new(
            title,
            description,
            join_sections(&parts),
            &source.name,
            address.as_str(),
            true,
        )]
    }

    fn kind(&self) -> FormatKind {
        FormatKind::Gallery
    }
}
