//! Site adapter strategy and registry.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::ReaderError;
use crate::position::BookIdentity;

/// One fetched and extracted chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionDocument {
    /// Reading text with markup and boilerplate removed.
    pub text: String,
    /// Locator of the following chapter, if any.
    pub next: Option<String>,
    /// Locator of the preceding chapter, if any.
    pub prev: Option<String>,
    /// Zero-based chapter position, when the site exposes one.
    pub ordinal: Option<u32>,
    /// Total chapters in the book, when the site exposes it.
    pub section_count: Option<u32>,
    /// Chapter heading.
    pub title: Option<String>,
}

impl SectionDocument {
    /// Creates a document with text only.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Sets the next chapter locator.
    #[must_use]
    pub fn with_next(mut self, locator: impl Into<String>) -> Self {
        self.next = Some(locator.into());
        self
    }

    /// Sets the previous chapter locator.
    #[must_use]
    pub fn with_prev(mut self, locator: impl Into<String>) -> Self {
        self.prev = Some(locator.into());
        self
    }

    /// Sets the chapter position and count.
    #[must_use]
    pub fn with_position(mut self, ordinal: u32, section_count: u32) -> Self {
        self.ordinal = Some(ordinal);
        self.section_count = Some(section_count);
        self
    }
}

/// Site-specific knowledge for one remote origin.
///
/// New sites are supported by implementing this trait; the paging algorithm
/// in [`RemoteSectionedSource`](super::RemoteSectionedSource) is shared.
#[async_trait]
pub trait SiteAdapter: Send + Sync + Debug {
    /// Adapter name, used for configuration and logging.
    fn name(&self) -> &str;

    /// Whether a locator belongs to this site.
    fn matches_origin(&self, locator: &str) -> bool;

    /// Finds the first chapter of a book from its root URL.
    async fn resolve_first_section(&self, identity: &BookIdentity) -> Result<String, ReaderError>;

    /// Fetches a chapter and extracts its text and neighbours.
    async fn fetch_and_extract(&self, locator: &str) -> Result<SectionDocument, ReaderError>;
}

/// Ordered set of site adapters.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    adapters: Vec<Arc<dyn SiteAdapter>>,
}

impl SiteRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an adapter. Earlier adapters win when several match.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn SiteAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Adds an adapter in place.
    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.push(adapter);
    }

    /// Finds the adapter for a locator.
    #[must_use]
    pub fn find(&self, locator: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.matches_origin(locator))
            .cloned()
    }

    /// Finds the adapter for a locator or fails with `UnsupportedOrigin`.
    pub fn resolve(&self, locator: &str) -> Result<Arc<dyn SiteAdapter>, ReaderError> {
        self.find(locator)
            .ok_or_else(|| ReaderError::unsupported_origin(locator))
    }

    /// Names of the registered adapters, in priority order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Returns the number of adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns true if no adapters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSite;

    #[test]
    fn test_registry_picks_first_match() {
        let a = Arc::new(ScriptedSite::new("https://a.test/"));
        let b = Arc::new(ScriptedSite::new("https://b.test/"));
        let registry = SiteRegistry::new().with_adapter(a).with_adapter(b);

        let found = registry.resolve("https://b.test/book/1.html").unwrap();
        assert!(found.matches_origin("https://b.test/other"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_unsupported_origin() {
        let registry = SiteRegistry::new().with_adapter(Arc::new(ScriptedSite::new("https://a.test/")));
        let err = registry.resolve("https://c.test/1.html").unwrap_err();
        assert!(matches!(err, ReaderError::UnsupportedOrigin { ref locator } if locator == "https://c.test/1.html"));
    }

    #[test]
    fn test_section_document_builder() {
        let doc = SectionDocument::new("text")
            .with_next("n")
            .with_prev("p")
            .with_position(2, 10);
        assert_eq!(doc.next.as_deref(), Some("n"));
        assert_eq!(doc.prev.as_deref(), Some("p"));
        assert_eq!(doc.section_count, Some(10));
    }
}
