//! Document source collaborator: discovers and fetches documents for a source.
//!
//! [`HttpDocumentSource`] talks to real documentation sites;
//! [`MemoryDocumentSource`] serves canned documents for offline runs and tests.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use galleryforge_shared::{FormatKind, GalleryError, Result, SourceDescriptor};

/// User-Agent string for document requests.
const USER_AGENT: &str = concat!("galleryforge/", env!("CARGO_PKG_VERSION"));

static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// A fetched document: HTTP-like status plus the raw body.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub address: Url,
    pub status: u16,
    pub body: String,
}

impl FetchedDocument {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Supplies document addresses and documents for a source.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Resolve the ordered list of document addresses for `source`.
    async fn discover(&self, source: &SourceDescriptor) -> Result<Vec<Url>>;

    /// Fetch one document. A non-success status is returned, not raised.
    async fn fetch(&self, address: &Url) -> Result<FetchedDocument>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Fetches documents over HTTP with a bounded per-request timeout.
pub struct HttpDocumentSource {
    client: Client,
}

impl HttpDocumentSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| GalleryError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    #[instrument(skip_all, fields(source = %source.name))]
    async fn discover(&self, source: &SourceDescriptor) -> Result<Vec<Url>> {
        let entries = entry_points(source)?;

        if source.format_kind == FormatKind::PlainDoc {
            return Ok(dedupe(entries));
        }

        let patterns = compile_patterns(&source.locator_patterns);
        let mut found = Vec::new();
        let mut failures = Vec::new();

        for entry in &entries {
            let page = match self.fetch(entry).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(%entry, error = %e, "index page unavailable");
                    failures.push(e.to_string());
                    continue;
                }
            };
            if !page.is_success() {
                warn!(%entry, status = page.status, "index page returned non-success status");
                continue;
            }
            found.extend(matching_links(&page.body, entry, &patterns));
        }

        if !entries.is_empty() && failures.len() == entries.len() {
            return Err(GalleryError::Network(format!(
                "no index page reachable for '{}': {}",
                source.name,
                failures.join("; ")
            )));
        }

        let found = dedupe(found);
        debug!(documents = found.len(), "discovery complete");
        Ok(found)
    }

    async fn fetch(&self, address: &Url) -> Result<FetchedDocument> {
        debug!(%address, "fetching document");

        let response = self
            .client
            .get(address.as_str())
            .send()
            .await
            .map_err(|e| GalleryError::Network(format!("{address}: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GalleryError::Network(format!("{address}: body read failed: {e}")))?;

        Ok(FetchedDocument {
            address: address.clone(),
            status,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Serves documents from memory. Addresses not registered answer 404.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentSource {
    listings: HashMap<String, Vec<Url>>,
    documents: HashMap<String, (u16, String)>,
    unreachable: HashSet<String>,
    unreachable_documents: HashSet<String>,
}

impl MemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the discovered addresses for a source name.
    pub fn with_listing(mut self, source: &str, addresses: Vec<Url>) -> Self {
        self.listings.insert(source.to_string(), addresses);
        self
    }

    /// Register a document body served with status 200.
    pub fn with_document(self, address: &Url, body: impl Into<String>) -> Self {
        self.with_status(address, 200, body)
    }

    pub fn with_status(mut self, address: &Url, status: u16, body: impl Into<String>) -> Self {
        self.documents
            .insert(address.to_string(), (status, body.into()));
        self
    }

    /// Make discovery for `source` fail as if the site were down.
    pub fn with_unreachable(mut self, source: &str) -> Self {
        self.unreachable.insert(source.to_string());
        self
    }

    /// Make fetching `address` fail with a network error.
    pub fn with_unreachable_document(mut self, address: &Url) -> Self {
        self.unreachable_documents.insert(address.to_string());
        self
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    async fn discover(&self, source: &SourceDescriptor) -> Result<Vec<Url>> {
        if self.unreachable.contains(&source.name) {
            return Err(GalleryError::Network(format!(
                "{}: connection refused",
                source.base_location
            )));
        }
        Ok(self.listings.get(&source.name).cloned().unwrap_or_default())
    }

    async fn fetch(&self, address: &Url) -> Result<FetchedDocument> {
        if self.unreachable_documents.contains(address.as_str()) {
            return Err(GalleryError::Network(format!("{address}: connection reset")));
        }
        let (status, body) = self
            .documents
            .get(address.as_str())
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(FetchedDocument {
            address: address.clone(),
            status,
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// Discovery helpers
// ---------------------------------------------------------------------------

/// Resolve a source's entry points against its base location.
fn entry_points(source: &SourceDescriptor) -> Result<Vec<Url>> {
    let base = Url::parse(&source.base_location).map_err(|e| {
        GalleryError::validation(format!(
            "source '{}' has invalid base location: {e}",
            source.name
        ))
    })?;

    Ok(source
        .entry_points
        .iter()
        .filter_map(|p| base.join(p).ok())
        .collect())
}

/// Convert a glob-like pattern to a regex (`**` any, `*` one path segment).
pub(crate) fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    regex::Regex::new(&format!("^{escaped}$")).ok()
}

fn compile_patterns(patterns: &[String]) -> Vec<regex::Regex> {
    patterns
        .iter()
        .filter_map(|p| {
            let compiled = glob_to_regex(p);
            if compiled.is_none() {
                warn!(pattern = %p, "ignoring invalid locator pattern");
            }
            compiled
        })
        .collect()
}

/// Links on `body` whose path matches any pattern. With no patterns, every
/// same-host link is kept.
pub(crate) fn matching_links(body: &str, base: &Url, patterns: &[regex::Regex]) -> Vec<Url> {
    let doc = Html::parse_document(body);
    extract_links(&doc, base)
        .into_iter()
        .filter(|link| {
            if patterns.is_empty() {
                link.host_str() == base.host_str()
            } else {
                patterns.iter().any(|p| p.is_match(link.path()))
            }
        })
        .collect()
}

/// Extract all links from a document, resolved against the base URL.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    for el in doc.select(&LINK) {
        if let Some(href) = el.value().attr("href") {
            if href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }

            if let Ok(mut resolved) = base_url.join(href) {
                resolved.set_fragment(None);
                links.push(resolved);
            }
        }
    }

    links
}

/// Drop repeated addresses, keeping first-seen order.
fn dedupe(urls: Vec<Url>) -> Vec<Url> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.to_string()))
        .collect()
}
