//! Document discovery, format extraction, and static inference.
//!
//! This crate provides:
//! - [`extractors`]: one [`FormatExtractor`] per document format
//! - [`infer`]: dependency and category inference over artifact text
//! - [`source`]: the [`DocumentSource`] collaborator (HTTP and in-memory)
//! - [`extract_source`]: capped, per-source extraction

pub mod extractors;
pub mod harvest;
pub mod infer;
pub mod source;

pub use extractors::{
    FormatExtractor, GalleryExtractor, NotebookExtractor, PlainDocExtractor, extractor_for,
};
pub use harvest::{ExtractionLimits, extract_document, extract_source};
pub use infer::{annotate, infer_category, infer_dependencies};
pub use source::{DocumentSource, FetchedDocument, HttpDocumentSource, MemoryDocumentSource};

#[cfg(test)]
mod tests {
    use super::*;
    use galleryforge_shared::{Category, FormatKind, SECTION_MARKER, SourceDescriptor};
    use scraper::Html;
    use url::Url;

    fn load_fixture(name: &str) -> Html {
        let path = format!("../../../fixtures/html/{name}");
        let content = std::fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("missing fixture: {path}"));
        Html::parse_document(&content)
    }

    fn source(name: &str, kind: FormatKind) -> SourceDescriptor {
        SourceDescriptor {
            name: name.into(),
            base_location: "https://docs.example.org".into(),
            format_kind: kind,
            locator_patterns: vec![],
            entry_points: vec![],
            priority: 1,
            description: String::new(),
            repository: None,
        }
    }

    fn page_url() -> Url {
        Url::parse("https://docs.example.org/gallery/map/plot_grid.html").unwrap()
    }

    // -----------------------------------------------------------------------
    // Gallery
    // -----------------------------------------------------------------------

    #[test]
    fn gallery_extracts_all_blocks_in_order() {
        let doc = load_fixture("gallery.html");
        let found = GalleryExtractor.extract(&doc, &source("sunpy", FormatKind::Gallery), &page_url());

        assert_eq!(found.len(), 1);
        let artifact = &found[0];
        assert_eq!(artifact.title, "Overlaying a grid on an AIA map");
        assert_eq!(
            artifact.description,
            "How to draw a heliographic grid on top of an AIA image."
        );
        assert!(artifact.generates_visual_output);
        assert_eq!(artifact.source_name, "sunpy");
        assert_eq!(artifact.origin_location, page_url().as_str());

        // Three non-empty blocks, two markers between them.
        let sections: Vec<&str> = artifact.body.split(SECTION_MARKER).collect();
        assert_eq!(sections.len(), 3);
        assert!(sections[0].starts_with("import matplotlib.pyplot as plt"));
        assert!(sections[1].contains("aia = sunpy.map.Map(AIA_171_IMAGE)"));
        assert!(sections[2].trim_start_matches(['\n', '#', ' ']).starts_with("fig = plt.figure()"));
    }

    #[test]
    fn gallery_falls_back_to_literal_blocks() {
        let doc = load_fixture("gallery_literal.html");
        let found = GalleryExtractor.extract(&doc, &source("sunpy", FormatKind::Gallery), &page_url());

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Reading a time series");
        assert_eq!(found[0].description, "");
        assert!(found[0].body.starts_with("import sunpy.timeseries as ts"));
        assert!(found[0].body.ends_with("goes.peek()"));
    }

    #[test]
    fn gallery_defaults_missing_heading() {
        let doc = load_fixture("no_heading.html");
        let found = GalleryExtractor.extract(&doc, &source("sunpy", FormatKind::Gallery), &page_url());

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Untitled Example");
        assert_eq!(found[0].description, "");
    }

    // -----------------------------------------------------------------------
    // Notebook
    // -----------------------------------------------------------------------

    #[test]
    fn notebook_drops_output_cells() {
        let doc = load_fixture("notebook.html");
        let found =
            NotebookExtractor.extract(&doc, &source("plasmapy", FormatKind::Notebook), &page_url());

        assert_eq!(found.len(), 1);
        let artifact = &found[0];
        assert_eq!(artifact.title, "Particle Stepper");
        assert_eq!(
            artifact.description,
            "An example of using the Boris pusher to step a particle."
        );
        assert!(artifact.body.contains("from plasmapy.particles import Particle"));
        assert!(artifact.body.contains("proton = Particle(\"p+\")"));
        assert!(!artifact.body.contains("[2]:"));
        assert_eq!(artifact.body.matches(SECTION_MARKER).count(), 1);
    }

    #[test]
    fn notebook_defaults_missing_heading() {
        let doc = Html::parse_document(r#"<div class="input"><pre>x = 1</pre></div>"#);
        let found =
            NotebookExtractor.extract(&doc, &source("plasmapy", FormatKind::Notebook), &page_url());
        assert_eq!(found[0].title, "Untitled Notebook");
        assert_eq!(found[0].body, "x = 1");
    }

    // -----------------------------------------------------------------------
    // Plain documentation
    // -----------------------------------------------------------------------

    #[test]
    fn plain_doc_takes_first_python_block() {
        let doc = load_fixture("plain_doc.html");
        let found =
            PlainDocExtractor.extract(&doc, &source("pyspedas", FormatKind::PlainDoc), &page_url());

        assert_eq!(found.len(), 1);
        let artifact = &found[0];
        assert_eq!(artifact.title, "Pyspedas Basic Example");
        assert_eq!(artifact.description, "Basic usage example from pyspedas documentation");
        assert_eq!(artifact.category, Category::Basic);
        assert!(!artifact.generates_visual_output);
        assert!(artifact.body.starts_with("import pyspedas"));
        assert!(!artifact.body.contains("tplot"));
        assert!(!artifact.body.contains(SECTION_MARKER));
    }

    // -----------------------------------------------------------------------
    // No code at all
    // -----------------------------------------------------------------------

    #[test]
    fn document_without_code_yields_nothing() {
        let doc = load_fixture("no_code.html");
        for kind in [FormatKind::Gallery, FormatKind::Notebook, FormatKind::PlainDoc] {
            let found = extractor_for(kind).extract(&doc, &source("any", kind), &page_url());
            assert!(found.is_empty(), "{kind} extracted from a page without code");
        }
    }

    #[test]
    fn annotate_after_extraction() {
        let doc = load_fixture("gallery.html");
        let mut found =
            GalleryExtractor.extract(&doc, &source("sunpy", FormatKind::Gallery), &page_url());
        let artifact = &mut found[0];
        annotate(artifact);

        assert_eq!(artifact.category, Category::Maps);
        let deps: Vec<&str> = artifact.dependencies.iter().map(String::as_str).collect();
        assert_eq!(deps, ["matplotlib", "sunpy"]);
    }
}
