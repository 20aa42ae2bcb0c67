//! Content sources: uniform paging over local files and remote books.
//!
//! This module provides:
//! - The `ContentSource` trait every backing store implements
//! - `LocalFileSource` over a text file
//! - `RemoteSectionedSource` over lazily fetched chapters
//! - `SiteAdapter` strategies and the `SiteRegistry` that picks one

mod local;
mod remote;
mod site;

pub use local::LocalFileSource;
pub use remote::RemoteSectionedSource;
pub use site::{SectionDocument, SiteAdapter, SiteRegistry};

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::config::ReaderConfig;
use crate::errors::ReaderError;
use crate::position::{BookIdentity, PositionRecord};

/// A bounded slice of content delivered by one paging call.
///
/// An empty page means end of content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    text: String,
    char_len: usize,
}

impl Page {
    /// Creates a page from text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let char_len = text.chars().count();
        Self { text, char_len }
    }

    /// The end-of-content page.
    #[must_use]
    pub fn end() -> Self {
        Self::default()
    }

    /// Whether this page signals end of content.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.char_len == 0
    }

    /// The page text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of characters on the page.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// Consumes the page, returning its text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Paging state of a source, restorable with [`ContentSource::restore`].
#[derive(Debug, Clone)]
pub struct Checkpoint(CheckpointState);

#[derive(Debug, Clone)]
enum CheckpointState {
    Local { consumed_offset: usize },
    Remote(remote::RemoteState),
}

impl Checkpoint {
    /// The resume point the checkpoint returns to.
    #[must_use]
    pub fn record(&self) -> PositionRecord {
        match &self.0 {
            CheckpointState::Local { consumed_offset } => PositionRecord::local(*consumed_offset),
            CheckpointState::Remote(state) => state.record(),
        }
    }
}

/// Paging over some backing content.
///
/// Implementations never advance on error: a failed call may be retried
/// unchanged.
#[async_trait]
pub trait ContentSource: Send + Debug {
    /// Short name of the source kind.
    fn kind(&self) -> &'static str;

    /// Returns the next page, advancing by exactly its length.
    async fn next_page(&mut self, page_size: usize) -> Result<Page, ReaderError>;

    /// Steps back one page, clamped at the start of content.
    async fn prev_page(&mut self, page_size: usize) -> Result<Page, ReaderError>;

    /// Progress through the book, in `[0, 100]`.
    fn percent_complete(&self) -> f64;

    /// The current resume point.
    fn snapshot(&self) -> PositionRecord;

    /// Captures the full paging state, progress bookkeeping included.
    fn checkpoint(&self) -> Checkpoint;

    /// Returns to a checkpoint taken from this source, in memory.
    ///
    /// Fails with [`ReaderError::Released`] after `release`, and with
    /// [`ReaderError::UnsupportedBookKind`] for a checkpoint of another kind.
    fn restore(&mut self, checkpoint: Checkpoint) -> Result<(), ReaderError>;

    /// Releases held resources. Safe to call more than once.
    fn release(&mut self);
}

/// Builds the content source a record describes.
///
/// Local records open `identity` as a file path. Remote records are matched
/// against `sites` by their section locator; no network traffic happens
/// until the first page is requested.
pub async fn open_source(
    identity: &BookIdentity,
    record: &PositionRecord,
    sites: &SiteRegistry,
    config: &ReaderConfig,
    token: Arc<CancellationToken>,
) -> Result<Box<dyn ContentSource>, ReaderError> {
    match record {
        PositionRecord::Local { consumed_offset } => {
            let source = LocalFileSource::open(identity.as_str(), *consumed_offset, token).await?;
            Ok(Box::new(source))
        }
        PositionRecord::Remote {
            consumed_offset,
            section_locator,
        } => {
            let adapter = sites.resolve(section_locator)?;
            Ok(Box::new(RemoteSectionedSource::new(
                adapter,
                section_locator.clone(),
                *consumed_offset,
                config.remote.estimated_section_count,
                token,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_counts_chars_not_bytes() {
        let page = Page::new("第一章 开始");
        assert_eq!(page.char_len(), 6);
        assert!(!page.is_end());
    }

    #[test]
    fn test_end_page() {
        assert!(Page::end().is_end());
        assert_eq!(Page::end().text(), "");
    }

    #[tokio::test]
    async fn test_remote_record_with_unknown_origin() {
        let record = PositionRecord::remote("https://unknown.test/1.html", 0);
        let err = open_source(
            &BookIdentity::new("https://unknown.test/"),
            &record,
            &SiteRegistry::new(),
            &ReaderConfig::default(),
            Arc::new(CancellationToken::new()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ReaderError::UnsupportedOrigin { .. }));
    }
}
