//! Application configuration for galleryforge.
//!
//! User config lives at `~/.galleryforge/galleryforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GalleryError, Result};
use crate::registry::SourceRegistry;
use crate::types::SourceDescriptor;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "galleryforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".galleryforge";

// ---------------------------------------------------------------------------
// Config structs (matching galleryforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transformation service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Batch/concurrency settings for enrichment.
    #[serde(default)]
    pub enrichment: EnrichmentSettings,

    /// Per-source extraction limits.
    #[serde(default)]
    pub extraction: ExtractionSettings,

    /// Inclusion policy constants.
    #[serde(default)]
    pub policy: PolicySettings,

    /// Output location.
    #[serde(default)]
    pub output: OutputSettings,

    /// Source list. Empty means "use the built-in registry".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDescriptor>,
}

/// `[service]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Messages endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            endpoint: default_endpoint(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn default_model() -> String {
    "claude-3-5-sonnet-latest".into()
}
fn default_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".into()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_temperature() -> f32 {
    0.1
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSettings {
    /// Batch size and upper bound on in-flight service calls.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Minimum ms between two dispatches within a batch.
    #[serde(default = "default_dispatch_spacing")]
    pub dispatch_spacing_ms: u64,

    /// Time bound on every service call.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            dispatch_spacing_ms: default_dispatch_spacing(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

fn default_max_concurrent() -> usize {
    3
}
fn default_dispatch_spacing() -> u64 {
    1000
}
fn default_call_timeout() -> u64 {
    120
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    #[serde(default = "default_gallery_cap")]
    pub gallery_cap: usize,

    #[serde(default = "default_notebook_cap")]
    pub notebook_cap: usize,

    #[serde(default = "default_plain_doc_cap")]
    pub plain_doc_cap: usize,

    /// Time bound on each document fetch.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            gallery_cap: default_gallery_cap(),
            notebook_cap: default_notebook_cap(),
            plain_doc_cap: default_plain_doc_cap(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_gallery_cap() -> usize {
    10
}
fn default_notebook_cap() -> usize {
    5
}
fn default_plain_doc_cap() -> usize {
    1
}
fn default_fetch_timeout() -> u64 {
    30
}

/// `[policy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Strictly above this confidence an artifact always publishes.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Sources with fewer published artifacts than this always publish.
    #[serde(default = "default_min_per_source")]
    pub min_per_source: usize,

    /// Case-insensitive title substrings that mark an artifact as recent.
    #[serde(default = "default_recency_keywords")]
    pub recency_keywords: Vec<String>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            min_per_source: default_min_per_source(),
            recency_keywords: default_recency_keywords(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_min_per_source() -> usize {
    2
}
fn default_recency_keywords() -> Vec<String> {
    ["new", "latest", "2024", "2023"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory receiving published files and the summary report.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Packages that get added to `requirements.txt` when an extracted
    /// example imports them.
    #[serde(default = "default_tracked_packages")]
    pub tracked_packages: Vec<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            tracked_packages: default_tracked_packages(),
        }
    }
}

fn default_output_dir() -> String {
    "gallery".into()
}
fn default_tracked_packages() -> Vec<String> {
    [
        "sunpy",
        "plasmapy",
        "pyspedas",
        "spacepy",
        "pysat",
        "astropy",
        "numpy",
        "matplotlib",
        "scipy",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl AppConfig {
    /// Build the source registry: configured sources if any, else the built-ins.
    pub fn registry(&self) -> Result<SourceRegistry> {
        if self.sources.is_empty() {
            Ok(SourceRegistry::builtin())
        } else {
            SourceRegistry::new(self.sources.clone())
        }
    }

    /// Check every value a run depends on. Called before any side effect.
    pub fn validate(&self) -> Result<()> {
        if self.enrichment.max_concurrent == 0 {
            return Err(GalleryError::config(
                "enrichment.max_concurrent must be at least 1",
            ));
        }
        if self.enrichment.call_timeout_secs == 0 {
            return Err(GalleryError::config(
                "enrichment.call_timeout_secs must be at least 1",
            ));
        }
        if !self.policy.confidence_threshold.is_finite() {
            return Err(GalleryError::config(
                "policy.confidence_threshold must be a finite number",
            ));
        }
        if url::Url::parse(&self.service.endpoint).is_err() {
            return Err(GalleryError::config(format!(
                "service.endpoint '{}' is not a valid URL",
                self.service.endpoint
            )));
        }
        self.registry()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.galleryforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| GalleryError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.galleryforge/galleryforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| GalleryError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| GalleryError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| GalleryError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| GalleryError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| GalleryError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the service API key env var is set and non-empty, returning it.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.service.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(GalleryError::config(format!(
            "transformation service API key not found. Set the {var_name} environment variable."
        ))),
    }
}
