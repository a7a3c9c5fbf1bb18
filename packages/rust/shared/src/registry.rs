//! Source registry: the static catalog of documentation sources for a run.

use std::collections::HashSet;

use url::Url;

use crate::error::{GalleryError, Result};
use crate::types::{FormatKind, SourceDescriptor};

/// An immutable, validated list of sources.
///
/// Declaration order is kept; [`SourceRegistry::list_sources`] applies the
/// priority ordering on top of it.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    /// Validate and wrap a list of sources.
    ///
    /// Names must be non-empty and unique, base locations must be absolute URLs.
    pub fn new(sources: Vec<SourceDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for source in &sources {
            if source.name.trim().is_empty() {
                return Err(GalleryError::validation("source name must not be empty"));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(GalleryError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            Url::parse(&source.base_location).map_err(|e| {
                GalleryError::validation(format!(
                    "source '{}' has invalid base location '{}': {e}",
                    source.name, source.base_location
                ))
            })?;
        }
        Ok(Self { sources })
    }

    /// Sources ordered by ascending priority, ties kept in declaration order.
    pub fn list_sources(&self) -> Vec<&SourceDescriptor> {
        let mut ordered: Vec<&SourceDescriptor> = self.sources.iter().collect();
        // `sort_by_key` is stable, which is what keeps ties in declaration order.
        ordered.sort_by_key(|s| s.priority);
        ordered
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Keep only the named sources. Unknown names are a validation error.
    pub fn restrict_to(&self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        for name in names {
            if self.get(name).is_none() {
                return Err(GalleryError::validation(format!("unknown source '{name}'")));
            }
        }
        Ok(Self {
            sources: self
                .sources
                .iter()
                .filter(|s| names.contains(&s.name))
                .cloned()
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The heliophysics documentation sources shipped by default.
    pub fn builtin() -> Self {
        let sources = vec![
            SourceDescriptor {
                name: "sunpy".into(),
                base_location: "https://docs.sunpy.org".into(),
                format_kind: FormatKind::Gallery,
                locator_patterns: vec!["/en/stable/generated/gallery/*/plot_*.html".into()],
                entry_points: vec!["/en/stable/generated/gallery/index.html".into()],
                priority: 1,
                description: "Python for Solar Physics".into(),
                repository: Some("https://github.com/sunpy/sunpy".into()),
            },
            SourceDescriptor {
                name: "plasmapy".into(),
                base_location: "https://docs.plasmapy.org".into(),
                format_kind: FormatKind::Notebook,
                locator_patterns: vec!["/en/stable/notebooks/*/*.html".into()],
                entry_points: vec![
                    "/en/stable/notebooks/getting_started/".into(),
                    "/en/stable/notebooks/diagnostics/".into(),
                    "/en/stable/notebooks/dispersion/".into(),
                ],
                priority: 1,
                description: "Plasma research and education package".into(),
                repository: Some("https://github.com/PlasmaPy/PlasmaPy".into()),
            },
            SourceDescriptor {
                name: "pyspedas".into(),
                base_location: "https://pyspedas.readthedocs.io".into(),
                format_kind: FormatKind::PlainDoc,
                locator_patterns: vec!["/en/latest/*.html".into()],
                entry_points: vec!["/en/latest/".into()],
                priority: 2,
                description: "Heliophysics mission data tools".into(),
                repository: Some("https://github.com/spedas/pyspedas".into()),
            },
            SourceDescriptor {
                name: "spacepy".into(),
                base_location: "https://spacepy.github.io".into(),
                format_kind: FormatKind::PlainDoc,
                locator_patterns: vec!["/autosummary/spacepy.*.html".into()],
                entry_points: vec!["/".into()],
                priority: 2,
                description: "Space science library".into(),
                repository: Some("https://github.com/spacepy/spacepy".into()),
            },
            SourceDescriptor {
                name: "pysat".into(),
                base_location: "https://pysat.readthedocs.io".into(),
                format_kind: FormatKind::PlainDoc,
                locator_patterns: vec!["/en/latest/examples/*.html".into()],
                entry_points: vec!["/en/latest/".into()],
                priority: 2,
                description: "Satellite and radar data management tool".into(),
                repository: Some("https://github.com/pysat/pysat".into()),
            },
        ];

        Self { sources }
    }
}
