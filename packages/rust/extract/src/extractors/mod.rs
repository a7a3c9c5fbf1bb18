//! Format extractor trait and built-in extractors.
//!
//! Each [`FormatKind`] has one extractor that turns a parsed document into
//! zero or more [`CandidateArtifact`]s. Missing headings or descriptions
//! degrade to defaults; only a document without any code yields nothing.

mod gallery;
mod notebook;
mod plain_doc;

use std::sync::LazyLock;

use galleryforge_shared::{CandidateArtifact, FormatKind, SourceDescriptor, section_break};
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub use gallery::GalleryExtractor;
pub use notebook::NotebookExtractor;
pub use plain_doc::PlainDocExtractor;

static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static P: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static CODE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("code").unwrap());
static PRE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("pre").unwrap());

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Strategy for pulling candidate artifacts out of one document format.
pub trait FormatExtractor: Send + Sync {
    /// Extract candidates from `doc`, which was fetched from `address`.
    /// An empty vector means the document had no usable code.
    fn extract(
        &self,
        doc: &Html,
        source: &SourceDescriptor,
        address: &Url,
    ) -> Vec<CandidateArtifact>;

    /// The format this extractor handles.
    fn kind(&self) -> FormatKind;
}

/// The extractor responsible for a given format.
pub fn extractor_for(kind: FormatKind) -> &'static dyn FormatExtractor {
    match kind {
        FormatKind::Gallery => &GalleryExtractor,
        FormatKind::Notebook => &NotebookExtractor,
        FormatKind::PlainDoc => &PlainDocExtractor,
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Collapse an element's text and trim it.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// The first `h1`, without the Sphinx permalink glyph.
pub(crate) fn first_heading(doc: &Html) -> Option<String> {
    doc.select(&H1)
        .next()
        .map(|el| element_text(el).trim_end_matches('¶').trim().to_string())
        .filter(|title| !title.is_empty())
}

/// The first paragraph whose text is accepted by `keep`.
pub(crate) fn first_paragraph(doc: &Html, keep: impl Fn(&str) -> bool) -> Option<String> {
    doc.select(&P).map(element_text).find(|text| keep(text.as_str()))
}

/// Elements matching the first selector in `candidates` that matches anything.
pub(crate) fn select_blocks<'a>(doc: &'a Html, candidates: &[&Selector]) -> Vec<ElementRef<'a>> {
    for sel in candidates {
        let blocks: Vec<ElementRef<'a>> = doc.select(sel).collect();
        if !blocks.is_empty() {
            return blocks;
        }
    }
    Vec::new()
}

/// Code text of a block: its `code` descendant, else its `pre`, else nothing.
pub(crate) fn nested_code(block: ElementRef<'_>) -> Option<String> {
    block
        .select(&CODE)
        .next()
        .or_else(|| block.select(&PRE).next())
        .map(element_text)
}

/// Code text of a block, falling back to the block's own text.
pub(crate) fn code_or_self(block: ElementRef<'_>) -> String {
    block
        .select(&CODE)
        .next()
        .map(element_text)
        .unwrap_or_else(|| element_text(block))
}

/// Join code sections with the section-break marker.
pub(crate) fn join_sections(parts: &[String]) -> String {
    parts.join(&section_break())
}

/// Capitalize the first letter of every alphabetic run (`pyspedas` -> `Pyspedas`).
pub(crate) fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
