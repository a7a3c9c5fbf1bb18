//! Shared types, error model, configuration, and the source registry for galleryforge.
//!
//! This crate is the foundation depended on by all other galleryforge crates.
//! It provides:
//! - [`GalleryError`]: the unified error type
//! - Domain types ([`SourceDescriptor`], [`CandidateArtifact`], [`EnrichmentResult`])
//! - Configuration ([`AppConfig`], config loading)
//! - [`SourceRegistry`]: the priority-ordered source catalog

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichmentSettings, ExtractionSettings, OutputSettings, PolicySettings,
    ServiceConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key,
};
pub use error::{GalleryError, Result};
pub use registry::SourceRegistry;
pub use types::{
    CandidateArtifact, Category, EnrichmentResult, FailureReason, FormatKind, RunId,
    SECTION_MARKER, SourceDescriptor, content_hash, section_break,
};
