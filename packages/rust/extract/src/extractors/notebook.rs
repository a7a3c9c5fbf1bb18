//! Extractor for rendered notebook exports.

use std::sync::LazyLock;

use galleryforge_shared::{CandidateArtifact, FormatKind, SourceDescriptor};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::{FormatExtractor, first_heading, first_paragraph, join_sections, nested_code, select_blocks};

static HIGHLIGHT_PYTHON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.highlight-python").unwrap());
static INPUT_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.input").unwrap());

const DEFAULT_TITLE: &str = "Untitled Notebook";

/// Boilerplate paragraph emitted by notebook renderers.
const GENERATED_NOTICE: &str = "This page was generated";

/// Captured output cells start with a prompt such as `[1]:`.
const OUTPUT_PREFIX: char = '[';

/// One artifact per notebook page: the input cells, output cells dropped.
pub struct NotebookExtractor;

impl FormatExtractor for NotebookExtractor {
    fn extract(
        &self,
        doc: &Html,
        source: &SourceDescriptor,
        address: &Url,
    ) -> Vec<CandidateArtifact> {
        let parts: Vec<String> = select_blocks(doc, &[&*HIGHLIGHT_PYTHON, &*INPUT_CELL])
            .into_iter()
            .filter_map(nested_code)
            .filter(|code| !code.is_empty() && !code.starts_with(OUTPUT_PREFIX))
            .collect();

        if parts.is_empty() {
            debug!(%address, "no input cells on notebook page");
            return Vec::new();
        }

        let title = first_heading(doc).unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let description = first_paragraph(doc, |text| {
            !text.is_empty() && !text.starts_with(GENERATED_NOTICE)
        })
        .unwrap_or_default();

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
        FormatKind::Notebook
    }
}
