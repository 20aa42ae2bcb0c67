//! The single-book reading session.

use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::Reading;
use crate::cancellation::CancellationToken;
use crate::config::ReaderConfig;
use crate::errors::ReaderError;
use crate::position::{BookIdentity, PositionRecord, PositionStore};
use crate::search::{PageScan, SearchCursor};
use crate::source::{open_source, Checkpoint, ContentSource, SiteRegistry};

/// Direction of a page turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// The open book and the source paging it.
#[derive(Debug)]
struct ActiveBook {
    identity: BookIdentity,
    source: Box<dyn ContentSource>,
    token: Arc<CancellationToken>,
    open_id: Uuid,
}

/// Owns the active book and serialises every operation on it.
///
/// Calls queue on an async FIFO lock in the order they were issued, except
/// [`ReadingSession::try_turn_forward`] which gives up with
/// [`ReaderError::Busy`] instead of waiting. Opening or closing a book
/// cancels the previous book's in-flight fetch without waiting for the lock.
#[derive(Debug)]
pub struct ReadingSession {
    config: ReaderConfig,
    positions: PositionStore,
    sites: SiteRegistry,
    active: tokio::sync::Mutex<Option<ActiveBook>>,
    current_token: parking_lot::Mutex<Option<Arc<CancellationToken>>>,
}

impl ReadingSession {
    /// Creates a session with no book open.
    pub fn new(
        config: ReaderConfig,
        positions: PositionStore,
        sites: SiteRegistry,
    ) -> Result<Self, ReaderError> {
        config.validate()?;
        Ok(Self {
            config,
            positions,
            sites,
            active: tokio::sync::Mutex::new(None),
            current_token: parking_lot::Mutex::new(None),
        })
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// The registered site adapters.
    #[must_use]
    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    /// Makes `identity` the active book, releasing the previous one.
    ///
    /// The first open of an identity creates and persists its initial
    /// record: the first chapter for a URL claimed by a site adapter,
    /// otherwise the start of a local file.
    pub async fn open(&self, identity: impl Into<BookIdentity>) -> Result<(), ReaderError> {
        let identity = identity.into();
        let open_id = Uuid::new_v4();
        let token = Arc::new(CancellationToken::new());
        self.replace_token(Some(token.clone()), "another book was opened");

        let span = info_span!("open", %open_id, identity = %identity);
        async {
            let mut active = self.active.lock().await;
            if let Some(mut previous) = active.take() {
                previous.source.release();
                debug!(identity = %previous.identity, "Released previous book");
            }
            // A later open may already have superseded this one.
            token.check()?;

            let record = match self.positions.load(&identity).await? {
                Some(record) => record,
                None => {
                    let record = self.initial_record(&identity, &token).await?;
                    self.positions.save(&identity, &record).await?;
                    record
                }
            };

            let source = open_source(&identity, &record, &self.sites, &self.config, token.clone()).await?;
            info!(
                kind = source.kind(),
                offset = record.consumed_offset(),
                percent = source.percent_complete(),
                "Opened book"
            );
            *active = Some(ActiveBook {
                identity: identity.clone(),
                source,
                token: token.clone(),
                open_id,
            });
            Ok::<(), ReaderError>(())
        }
        .instrument(span)
        .await
    }

    /// Closes the active book, aborting any in-flight fetch.
    pub async fn close(&self) {
        self.replace_token(None, "book closed");
        let mut active = self.active.lock().await;
        if let Some(mut book) = active.take() {
            book.source.release();
            info!(identity = %book.identity, "Closed book");
        }
    }

    /// Identity of the active book.
    pub async fn current_identity(&self) -> Option<BookIdentity> {
        self.active.lock().await.as_ref().map(|book| book.identity.clone())
    }

    /// Progress through the active book.
    pub async fn percent(&self) -> Option<f64> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|book| book.source.percent_complete())
    }

    /// Delivers the next page and persists the new position.
    pub async fn turn_forward(&self, page_size: usize) -> Result<Reading, ReaderError> {
        let mut active = self.active.lock().await;
        let book = active.as_mut().ok_or(ReaderError::NoActiveBook)?;
        self.turn(book, Direction::Forward, page_size).await
    }

    /// Steps back one page and persists the new position.
    pub async fn turn_backward(&self, page_size: usize) -> Result<Reading, ReaderError> {
        let mut active = self.active.lock().await;
        let book = active.as_mut().ok_or(ReaderError::NoActiveBook)?;
        self.turn(book, Direction::Backward, page_size).await
    }

    /// Like [`turn_forward`](Self::turn_forward), but fails with
    /// [`ReaderError::Busy`] instead of queueing behind another call.
    pub async fn try_turn_forward(&self, page_size: usize) -> Result<Reading, ReaderError> {
        let mut active = self.active.try_lock().map_err(|_| ReaderError::Busy)?;
        let book = active.as_mut().ok_or(ReaderError::NoActiveBook)?;
        self.turn(book, Direction::Forward, page_size).await
    }

    /// Pages forward until `keyword` is found.
    ///
    /// Returns the page holding the end of the match. When the match began
    /// on the previous page, that page is delivered again instead. If the
    /// book ends first an end reading is returned; then, and on error, the
    /// source is rewound in memory to where the search started. If the
    /// rewind itself fails the book is released, so later calls fail with
    /// [`ReaderError::Released`] instead of reading from the wrong place.
    pub async fn search_forward(&self, keyword: &str) -> Result<Reading, ReaderError> {
        let mut cursor = SearchCursor::new(keyword, self.config.search.matcher)?;
        let page_size = self.config.page_size;

        let mut active = self.active.lock().await;
        let book = active.as_mut().ok_or(ReaderError::NoActiveBook)?;
        let span = info_span!("search", open_id = %book.open_id, keyword);

        async {
            let checkpoint = book.source.checkpoint();
            match self.scan(book, &mut cursor, page_size).await {
                Ok(Some(reading)) => {
                    info!(percent = reading.percent(), "Keyword found");
                    Ok(reading)
                }
                Ok(None) => {
                    info!("Keyword not found before end of book");
                    Self::rewind(book, checkpoint)?;
                    Ok(Reading::end(book.source.percent_complete()))
                }
                Err(e) => {
                    // The scan error is reported even when the rewind fails too.
                    let _ = Self::rewind(book, checkpoint);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn scan(
        &self,
        book: &mut ActiveBook,
        cursor: &mut SearchCursor,
        page_size: usize,
    ) -> Result<Option<Reading>, ReaderError> {
        let mut scanned = 0usize;
        loop {
            let page = book.source.next_page(page_size).await?;
            if page.is_end() {
                debug!(pages = scanned, "Search reached end of book");
                return Ok(None);
            }
            scanned += 1;

            match cursor.scan_page(page.text()) {
                PageScan::Found {
                    started_on_previous_page: false,
                    ..
                } => {
                    self.persist(book).await?;
                    return Ok(Some(Reading::new(page, book.source.percent_complete())));
                }
                PageScan::Found {
                    started_on_previous_page: true,
                    ..
                } => {
                    debug!(pages = scanned, "Match began on previous page");
                    return self
                        .turn(book, Direction::Backward, page_size)
                        .await
                        .map(Some);
                }
                PageScan::NotFound { .. } => {}
            }
        }
    }

    fn rewind(book: &mut ActiveBook, checkpoint: Checkpoint) -> Result<(), ReaderError> {
        let offset = checkpoint.record().consumed_offset();
        if let Err(e) = book.source.restore(checkpoint) {
            book.source.release();
            warn!(error = %e, "Could not rewind after search, released book");
            return Err(e);
        }
        debug!(offset, "Rewound to search start");
        Ok(())
    }

    async fn turn(
        &self,
        book: &mut ActiveBook,
        direction: Direction,
        page_size: usize,
    ) -> Result<Reading, ReaderError> {
        if page_size == 0 {
            return Err(ReaderError::InvalidConfig("page_size must be positive".to_string()));
        }
        book.token.check()?;

        let page = match direction {
            Direction::Forward => book.source.next_page(page_size).await?,
            Direction::Backward => book.source.prev_page(page_size).await?,
        };
        let percent = book.source.percent_complete();

        if page.is_end() {
            debug!(?direction, "End of book");
            return Ok(Reading::end(percent));
        }
        self.persist(book).await?;
        debug!(?direction, chars = page.char_len(), percent, "Turned page");
        Ok(Reading::new(page, percent))
    }

    async fn persist(&self, book: &mut ActiveBook) -> Result<(), ReaderError> {
        // Results of a superseded book are never written.
        book.token.check()?;
        self.positions.save(&book.identity, &book.source.snapshot()).await
    }

    async fn initial_record(
        &self,
        identity: &BookIdentity,
        token: &CancellationToken,
    ) -> Result<PositionRecord, ReaderError> {
        if let Some(adapter) = self.sites.find(identity.as_str()) {
            let first = token.run(adapter.resolve_first_section(identity)).await?;
            debug!(adapter = adapter.name(), first = %first, "Resolved first section");
            return Ok(PositionRecord::remote(first, 0));
        }
        if identity.is_url() {
            return Err(ReaderError::unsupported_origin(identity.as_str()));
        }
        Ok(PositionRecord::local(0))
    }

    fn replace_token(&self, next: Option<Arc<CancellationToken>>, reason: &str) {
        let previous = std::mem::replace(&mut *self.current_token.lock(), next);
        if let Some(previous) = previous {
            previous.cancel(reason);
        }
    }
}
