//! What a page turn hands back to the host.

use crate::source::Page;

/// Separator between page text and the progress indicator.
const PERCENT_SEPARATOR: &str = "   ";

/// A delivered page together with progress after delivering it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    page: Page,
    percent: f64,
}

impl Reading {
    /// Creates a reading.
    #[must_use]
    pub fn new(page: Page, percent: f64) -> Self {
        Self { page, percent }
    }

    /// An end-of-book reading.
    #[must_use]
    pub fn end(percent: f64) -> Self {
        Self::new(Page::end(), percent)
    }

    /// The delivered page.
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Progress in `[0, 100]`.
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Whether the book has no more content in the travel direction.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.page.is_end()
    }

    /// Text for the display: `"<content>   <percent>"`, or empty to hide it.
    #[must_use]
    pub fn display_text(&self) -> String {
        if self.is_end() {
            return String::new();
        }
        format!("{}{PERCENT_SEPARATOR}{}", self.page.text(), format_percent(self.percent))
    }
}

/// Formats progress as `NN.NN%`.
#[must_use]
pub fn format_percent(percent: f64) -> String {
    format!("{:.2}%", percent.clamp(0.0, 100.0))
}

/// Host callback receiving display updates.
///
/// An empty string means "hide the display".
pub trait DisplaySink: Send + Sync {
    /// Shows a line of text.
    fn show(&self, text: &str);
}

impl<F> DisplaySink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn show(&self, text: &str) {
        self(text);
    }
}
