//! Extractor for documentation pages without example structure.

use std::sync::LazyLock;

use galleryforge_shared::{CandidateArtifact, Category, FormatKind, SourceDescriptor};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::{FormatExtractor, code_or_self, select_blocks, title_case};

static HIGHLIGHT_PYTHON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.highlight-python").unwrap());
static PRE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("pre").unwrap());

/// Takes the first code block on the page as a minimal `basic` example.
pub struct PlainDocExtractor;

impl FormatExtractor for PlainDocExtractor {
    fn extract(
        &self,
        doc: &Html,
        source: &SourceDescriptor,
        address: &Url,
    ) -> Vec<CandidateArtifact> {
        let code = select_blocks(doc, &[&*HIGHLIGHT_PYTHON, &*PRE])
            .into_iter()
            .next()
            .map(code_or_self)
            .filter(|code| !code.is_empty());

        let Some(code) = code else {
            debug!(%address, "no code block on documentation page");
            return Vec::new();
        };

        let artifact = CandidateArtifact::new(
            format!("{} Basic Example", title_case(&source.name)),
            format!("Basic usage example from {} documentation", source.name),
            code,
            &source.name,
            address.as_str(),
            false,
        )
        .with_category(Category::Basic);

        vec![artifact]
    }

    fn kind(&self) -> FormatKind {
        FormatKind::PlainDoc
    }
}
