//! In-memory collaborators for exercising sessions without a network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::{NetworkError, ReaderError};
use crate::position::BookIdentity;
use crate::session::DisplaySink;
use crate::source::{SectionDocument, SiteAdapter};

/// A site adapter serving a fixed list of chapters.
///
/// Chapters are linked in the order they are added. Fetches can be made to
/// fail or to stall, and every fetch is counted.
#[derive(Debug)]
pub struct ScriptedSite {
    origin: String,
    order: Vec<String>,
    texts: HashMap<String, String>,
    report_positions: bool,
    latency: Option<Duration>,
    failures: Mutex<HashMap<String, usize>>,
    fetches: AtomicUsize,
}

impl ScriptedSite {
    /// Creates a site answering for locators under `origin`.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            order: Vec::new(),
            texts: HashMap::new(),
            report_positions: false,
            latency: None,
            failures: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Appends a chapter.
    #[must_use]
    pub fn chapter(mut self, locator: impl Into<String>, text: impl Into<String>) -> Self {
        let locator = locator.into();
        self.texts.insert(locator.clone(), text.into());
        self.order.push(locator);
        self
    }

    /// Reports chapter ordinal and count with every document.
    #[must_use]
    pub fn with_positions(mut self) -> Self {
        self.report_positions = true;
        self
    }

    /// Delays every fetch.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next `times` fetches of `locator` fail.
    pub fn fail_next(&self, locator: &str, times: usize) {
        self.failures.lock().insert(locator.to_string(), times);
    }

    /// Number of fetches served or failed so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SiteAdapter for ScriptedSite {
    fn name(&self) -> &str {
        "scripted"
    }

    fn matches_origin(&self, locator: &str) -> bool {
        locator.starts_with(&self.origin)
    }

    async fn resolve_first_section(&self, identity: &BookIdentity) -> Result<String, ReaderError> {
        self.order
            .first()
            .cloned()
            .ok_or_else(|| NetworkError::new(identity.as_str(), "book has no chapters").into())
    }

    async fn fetch_and_extract(&self, locator: &str) -> Result<SectionDocument, ReaderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        {
            let mut failures = self.failures.lock();
            if let Some(remaining) = failures.get_mut(locator) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(NetworkError::new(locator, "scripted failure").into());
                }
            }
        }

        let index = self
            .order
            .iter()
            .position(|l| l == locator)
            .ok_or_else(|| NetworkError::status(locator, 404))?;

        let mut doc = SectionDocument::new(self.texts[locator].clone());
        doc.next = self.order.get(index + 1).cloned();
        doc.prev = index.checked_sub(1).and_then(|i| self.order.get(i).cloned());
        if self.report_positions {
            let ordinal = u32::try_from(index).unwrap_or(u32::MAX);
            let count = u32::try_from(self.order.len()).unwrap_or(u32::MAX);
            doc = doc.with_position(ordinal, count);
        }
        Ok(doc)
    }
}

/// Display callback that records everything shown.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    shown: Mutex<Vec<String>>,
}

impl RecordingDisplay {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded updates, oldest first.
    #[must_use]
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().clone()
    }

    /// Number of recorded updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shown.lock().len()
    }

    /// Returns true if nothing was shown.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shown.lock().is_empty()
    }
}

impl DisplaySink for RecordingDisplay {
    fn show(&self, text: &str) {
        self.shown.lock().push(text.to_string());
    }
}
