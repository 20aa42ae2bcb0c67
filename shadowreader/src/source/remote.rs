//! Paging over a chaptered remote book.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::site::{SectionDocument, SiteAdapter};
use super::{Checkpoint, CheckpointState, ContentSource, Page};
use crate::cancellation::CancellationToken;
use crate::errors::ReaderError;
use crate::position::PositionRecord;

/// Upper bound on consecutive empty chapters skipped in one call.
const MAX_SECTION_HOPS: u32 = 32;

/// Extracted text of the chapter under the reader.
#[derive(Debug)]
struct LoadedSection {
    chars: Vec<char>,
    next: Option<String>,
    prev: Option<String>,
    ordinal: Option<u32>,
    section_count: Option<u32>,
}

impl LoadedSection {
    fn len(&self) -> usize {
        self.chars.len()
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end.min(self.chars.len())].iter().collect()
    }
}

impl From<SectionDocument> for LoadedSection {
    fn from(doc: SectionDocument) -> Self {
        Self {
            chars: doc.text.chars().collect(),
            next: doc.next,
            prev: doc.prev,
            ordinal: doc.ordinal,
            section_count: doc.section_count,
        }
    }
}

/// Saved paging state of a [`RemoteSectionedSource`].
#[derive(Debug, Clone)]
pub(super) struct RemoteState {
    locator: String,
    consumed_offset: usize,
    section: Option<Arc<LoadedSection>>,
    ordinal: u32,
    section_count: u32,
    delivered: bool,
}

impl RemoteState {
    pub(super) fn record(&self) -> PositionRecord {
        PositionRecord::remote(self.locator.clone(), self.consumed_offset)
    }
}

/// A remote book read chapter by chapter through a [`SiteAdapter`].
///
/// Only the current chapter is held in memory. Chapters are fetched when
/// paging runs off either end of the current one; fetched chapters are
/// staged and only committed once a page has been produced from them, so a
/// failed or cancelled fetch leaves the position untouched.
#[derive(Debug)]
pub struct RemoteSectionedSource {
    adapter: Arc<dyn SiteAdapter>,
    locator: String,
    consumed_offset: usize,
    section: Option<Arc<LoadedSection>>,
    /// Chapter position used for progress; relative when the site has none.
    ordinal: u32,
    section_count: u32,
    delivered: bool,
    released: bool,
    token: Arc<CancellationToken>,
}

impl RemoteSectionedSource {
    /// Creates a source positioned `consumed_offset` characters into the
    /// chapter at `locator`. Nothing is fetched until the first page turn.
    #[must_use]
    pub fn new(
        adapter: Arc<dyn SiteAdapter>,
        locator: impl Into<String>,
        consumed_offset: usize,
        estimated_section_count: u32,
        token: Arc<CancellationToken>,
    ) -> Self {
        Self {
            adapter,
            locator: locator.into(),
            consumed_offset,
            section: None,
            ordinal: 0,
            section_count: estimated_section_count.max(1),
            delivered: false,
            released: false,
            token,
        }
    }

    /// Locator of the current chapter.
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    fn ensure_live(&self) -> Result<(), ReaderError> {
        if self.released {
            return Err(ReaderError::Released);
        }
        self.token.check()
    }

    fn adopt_position(&mut self, section: &LoadedSection, fallback: u32) {
        self.ordinal = section.ordinal.unwrap_or(fallback);
        if !self.delivered {
            if let Some(count) = section.section_count {
                self.section_count = count.max(1);
            }
        }
    }

    async fn fetch(&self, locator: &str) -> Result<LoadedSection, ReaderError> {
        debug!(adapter = self.adapter.name(), locator, "Fetching section");
        let doc = self.adapter.fetch_and_extract(locator).await?;
        Ok(doc.into())
    }

    async fn ensure_loaded(&mut self) -> Result<(), ReaderError> {
        if self.section.is_none() {
            let section = self.fetch(&self.locator).await?;
            self.adopt_position(&section, self.ordinal);
            self.consumed_offset = self.consumed_offset.min(section.len());
            self.section = Some(Arc::new(section));
        }
        Ok(())
    }

    fn commit(&mut self, locator: String, section: LoadedSection, offset: usize, fallback_ordinal: u32) {
        self.adopt_position(&section, fallback_ordinal);
        debug!(from = %self.locator, to = %locator, "Moved to section");
        self.locator = locator;
        self.section = Some(Arc::new(section));
        self.consumed_offset = offset;
    }

    async fn forward(&mut self, page_size: usize) -> Result<Page, ReaderError> {
        self.ensure_loaded().await?;
        let Some(section) = self.section.as_ref() else {
            return Err(ReaderError::Released);
        };

        if self.consumed_offset < section.len() {
            let end = (self.consumed_offset + page_size).min(section.len());
            let text = section.slice(self.consumed_offset, end);
            self.consumed_offset = end;
            return Ok(Page::new(text));
        }

        let mut next = section.next.clone();
        let mut hops = 0;
        while let Some(locator) = next {
            hops += 1;
            if hops > MAX_SECTION_HOPS {
                warn!(locator = %locator, "Too many empty sections, treating as end of book");
                break;
            }
            let candidate = self.fetch(&locator).await?;
            if candidate.len() == 0 {
                next = candidate.next.clone();
                continue;
            }
            let end = page_size.min(candidate.len());
            let text = candidate.slice(0, end);
            let ordinal = self.ordinal.saturating_add(hops);
            self.commit(locator, candidate, end, ordinal);
            return Ok(Page::new(text));
        }

        Ok(Page::end())
    }

    async fn backward(&mut self, page_size: usize) -> Result<Page, ReaderError> {
        self.ensure_loaded().await?;
        let Some(section) = self.section.as_ref() else {
            return Err(ReaderError::Released);
        };

        // Earlier text remains in this chapter before the page on screen.
        if self.consumed_offset.saturating_sub(page_size) > 0 {
            let start = self.consumed_offset.saturating_sub(page_size.saturating_mul(2));
            let end = (start + page_size).min(section.len());
            let text = section.slice(start, end);
            self.consumed_offset = end;
            return Ok(Page::new(text));
        }

        let mut prev = section.prev.clone();
        let mut hops = 0;
        while let Some(locator) = prev {
            hops += 1;
            if hops > MAX_SECTION_HOPS {
                warn!(locator = %locator, "Too many empty sections, staying put");
                break;
            }
            let candidate = self.fetch(&locator).await?;
            if candidate.len() == 0 {
                prev = candidate.prev.clone();
                continue;
            }
            let len = candidate.len();
            let text = candidate.slice(len.saturating_sub(page_size), len);
            let ordinal = self.ordinal.saturating_sub(hops);
            self.commit(locator, candidate, len, ordinal);
            return Ok(Page::new(text));
        }

        // Start of the book: show its first page.
        let Some(section) = self.section.as_ref() else {
            return Err(ReaderError::Released);
        };
        let end = page_size.min(section.len());
        let text = section.slice(0, end);
        self.consumed_offset = end;
        Ok(Page::new(text))
    }
}

#[async_trait]
impl ContentSource for RemoteSectionedSource {
    fn kind(&self) -> &'static str {
        "remote"
    }

    async fn next_page(&mut self, page_size: usize) -> Result<Page, ReaderError> {
        self.ensure_live()?;
        let token = self.token.clone();
        let page = token.run(self.forward(page_size)).await?;
        self.delivered = true;
        Ok(page)
    }

    async fn prev_page(&mut self, page_size: usize) -> Result<Page, ReaderError> {
        self.ensure_live()?;
        let token = self.token.clone();
        let page = token.run(self.backward(page_size)).await?;
        self.delivered = true;
        Ok(page)
    }

    fn percent_complete(&self) -> f64 {
        let within = match &self.section {
            Some(section) if section.len() > 0 => {
                self.consumed_offset as f64 / section.len() as f64
            }
            _ => 0.0,
        };
        let estimate = (f64::from(self.ordinal) + within) / f64::from(self.section_count) * 100.0;
        estimate.clamp(0.0, 100.0)
    }

    fn snapshot(&self) -> PositionRecord {
        PositionRecord::remote(self.locator.clone(), self.consumed_offset)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint(CheckpointState::Remote(RemoteState {
            locator: self.locator.clone(),
            consumed_offset: self.consumed_offset,
            section: self.section.clone(),
            ordinal: self.ordinal,
            section_count: self.section_count,
            delivered: self.delivered,
        }))
    }

    fn restore(&mut self, checkpoint: Checkpoint) -> Result<(), ReaderError> {
        if self.released {
            return Err(ReaderError::Released);
        }
        let CheckpointState::Remote(state) = checkpoint.0 else {
            return Err(ReaderError::unsupported_kind("local"));
        };
        debug!(from = %self.locator, to = %state.locator, "Restored checkpoint");
        self.locator = state.locator;
        self.consumed_offset = state.consumed_offset;
        self.section = state.section;
        self.ordinal = state.ordinal;
        self.section_count = state.section_count;
        self.delivered = state.delivered;
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.section = None;
            debug!(locator = %self.locator, "Released remote book");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSite;
    use pretty_assertions::assert_eq;

    fn three_chapters() -> Arc<ScriptedSite> {
        Arc::new(
            ScriptedSite::new("https://novel.test/")
                .chapter("https://novel.test/1.html", "abcdefg")
                .chapter("https://novel.test/2.html", "hijk")
                .chapter("https://novel.test/3.html", "lmnopqr"),
        )
    }

    fn source(site: &Arc<ScriptedSite>, locator: &str, offset: usize) -> RemoteSectionedSource {
        RemoteSectionedSource::new(site.clone(), locator, offset, 3, Arc::new(CancellationToken::new()))
    }

    async fn drain(source: &mut RemoteSectionedSource, page_size: usize) -> Vec<String> {
        let mut pages = Vec::new();
        loop {
            let page = source.next_page(page_size).await.unwrap();
            if page.is_end() {
                return pages;
            }
            pages.push(page.into_text());
        }
    }

    #[tokio::test]
    async fn test_pages_across_sections() {
        let site = three_chapters();
        let mut source = source(&site, "https://novel.test/1.html", 0);

        let pages = drain(&mut source, 3).await;
        assert_eq!(pages, vec!["abc", "def", "g", "hij", "k", "lmn", "opq", "r"]);
        assert_eq!(source.snapshot(), PositionRecord::remote("https://novel.test/3.html", 7));
    }

    #[tokio::test]
    async fn test_resume_mid_section() {
        let site = three_chapters();
        let mut source = source(&site, "https://novel.test/2.html", 2);
        assert_eq!(source.next_page(5).await.unwrap().text(), "jk");
        assert_eq!(source.next_page(5).await.unwrap().text(), "lmnop");
    }

    #[tokio::test]
    async fn test_prev_crosses_into_previous_section_end() {
        let site = three_chapters();
        let mut source = source(&site, "https://novel.test/2.html", 0);

        assert_eq!(source.next_page(3).await.unwrap().text(), "hij");
        assert_eq!(source.prev_page(3).await.unwrap().text(), "efg");
        assert_eq!(source.snapshot(), PositionRecord::remote("https://novel.test/1.html", 7));
        assert_eq!(source.prev_page(3).await.unwrap().text(), "bcd");
        assert_eq!(source.prev_page(3).await.unwrap().text(), "abc");
        assert_eq!(source.prev_page(3).await.unwrap().text(), "abc");
    }

    #[tokio::test]
    async fn test_network_failure_leaves_position() {
        let site = three_chapters();
        let mut source = source(&site, "https://novel.test/1.html", 0);
        drain_section(&mut source).await;

        site.fail_next("https://novel.test/2.html", 1);
        let before = source.snapshot();
        let err = source.next_page(4).await.unwrap_err();

        assert!(matches!(err, ReaderError::Network(_)));
        assert_eq!(source.snapshot(), before);
        assert_eq!(source.next_page(4).await.unwrap().text(), "hijk");
    }

    async fn drain_section(source: &mut RemoteSectionedSource) {
        assert_eq!(source.next_page(7).await.unwrap().text(), "abcdefg");
    }

    #[tokio::test]
    async fn test_empty_sections_are_skipped() {
        let site = Arc::new(
            ScriptedSite::new("https://novel.test/")
                .chapter("https://novel.test/1.html", "ab")
                .chapter("https://novel.test/2.html", "")
                .chapter("https://novel.test/3.html", "cd"),
        );
        let mut source = source(&site, "https://novel.test/1.html", 0);
        assert_eq!(drain(&mut source, 5).await, vec!["ab", "cd"]);
    }

    #[tokio::test]
    async fn test_percent_monotonic() {
        let site = three_chapters();
        let mut source = source(&site, "https://novel.test/1.html", 0);

        let mut forward = vec![source.percent_complete()];
        while !source.next_page(2).await.unwrap().is_end() {
            forward.push(source.percent_complete());
        }
        assert!(forward.windows(2).all(|w| w[0] <= w[1]), "{forward:?}");
        assert!(*forward.last().unwrap() <= 100.0);

        let mut backward = vec![source.percent_complete()];
        for _ in 0..10 {
            source.prev_page(2).await.unwrap();
            backward.push(source.percent_complete());
        }
        assert!(backward.windows(2).all(|w| w[0] >= w[1]), "{backward:?}");
    }

    #[tokio::test]
    async fn test_site_reported_position_used_for_percent() {
        let site = Arc::new(
            ScriptedSite::new("https://novel.test/")
                .chapter("https://novel.test/1.html", "aaaa")
                .chapter("https://novel.test/2.html", "bbbb")
                .with_positions(),
        );
        let mut source = source(&site, "https://novel.test/2.html", 0);
        source.next_page(2).await.unwrap();
        // Chapter 2 of 2, half read.
        assert!((source.percent_complete() - 75.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_release_twice_and_reject_use() {
        let site = three_chapters();
        let mut source = source(&site, "https://novel.test/1.html", 0);
        source.release();
        source.release();
        assert!(matches!(source.next_page(3).await, Err(ReaderError::Released)));
    }

    #[tokio::test]
    async fn test_cancel_aborts_slow_fetch_without_mutation() {
        let site = Arc::new(
            ScriptedSite::new("https://novel.test/")
                .chapter("https://novel.test/1.html", "abc")
                .with_latency(std::time::Duration::from_secs(30)),
        );
        let token = Arc::new(CancellationToken::new());
        let mut source =
            RemoteSectionedSource::new(site, "https://novel.test/1.html", 0, 3, token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel("book closed");
        });

        let result = source.next_page(3).await;
        assert!(matches!(result, Err(ReaderError::Cancelled(_))));
        assert_eq!(source.snapshot(), PositionRecord::remote("https://novel.test/1.html", 0));
    }

    #[tokio::test]
    async fn test_restore_keeps_progress_without_refetch() {
        let site = three_chapters();
        let mut source = source(&site, "https://novel.test/1.html", 0);
        for _ in 0..4 {
            source.next_page(3).await.unwrap();
        }
        let before = source.percent_complete();
        let checkpoint = source.checkpoint();

        while !source.next_page(5).await.unwrap().is_end() {}
        let fetches = site.fetch_count();
        source.restore(checkpoint).unwrap();

        assert_eq!(source.snapshot(), PositionRecord::remote("https://novel.test/2.html", 3));
        assert!((source.percent_complete() - before).abs() < f64::EPSILON);
        assert_eq!(source.next_page(5).await.unwrap().text(), "k");
        assert!(source.percent_complete() >= before);
        assert_eq!(site.fetch_count(), fetches);
    }

    #[tokio::test]
    async fn test_restore_rejects_local_checkpoint() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let local = crate::source::LocalFileSource::open(
            file.path(),
            0,
            Arc::new(CancellationToken::new()),
        )
        .await
        .unwrap();
        let site = three_chapters();
        let mut source = source(&site, "https://novel.test/1.html", 0);

        let err = source.restore(local.checkpoint()).unwrap_err();
        assert!(matches!(err, ReaderError::UnsupportedBookKind { .. }));
    }
}
