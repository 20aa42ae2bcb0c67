//! Streaming keyword matching across page boundaries.
//!
//! A [`SearchCursor`] is fed one page at a time. It keeps the length of the
//! partial match at the end of the previous page so a keyword split over two
//! pages is still found, and reports whether a completed match began on the
//! previous page.

use crate::config::MatcherKind;
use crate::errors::ReaderError;

/// Outcome of scanning one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScan {
    /// The keyword completed on this page.
    Found {
        /// Character index on this page where the match ended.
        end: usize,
        /// Whether the match began on the previous page.
        started_on_previous_page: bool,
    },
    /// No match ended on this page.
    NotFound {
        /// Whether a partial match is pending at the page end.
        pending: bool,
    },
}

/// Transient search state over a stream of pages.
#[derive(Debug, Clone)]
pub struct SearchCursor {
    keyword: Vec<char>,
    kind: MatcherKind,
    /// Failure function: longest proper prefix that is also a suffix of
    /// `keyword[..=i]`.
    failure: Vec<usize>,
    matched: usize,
    pending_from_previous: bool,
}

impl SearchCursor {
    /// Creates a cursor for a non-empty keyword.
    pub fn new(keyword: &str, kind: MatcherKind) -> Result<Self, ReaderError> {
        let keyword: Vec<char> = keyword.chars().collect();
        if keyword.is_empty() {
            return Err(ReaderError::EmptyKeyword);
        }
        let failure = prefix_function(&keyword);
        Ok(Self {
            keyword,
            kind,
            failure,
            matched: 0,
            pending_from_previous: false,
        })
    }

    /// Length of the partial match against the trailing scanned characters.
    #[must_use]
    pub fn matched_len(&self) -> usize {
        self.matched
    }

    /// Whether a partial match was pending at the previous page's end.
    #[must_use]
    pub fn pending_from_previous(&self) -> bool {
        self.pending_from_previous
    }

    /// Keyword length in characters.
    #[must_use]
    pub fn keyword_len(&self) -> usize {
        self.keyword.len()
    }

    /// Advances by one character, returning true when the keyword completes.
    pub fn feed(&mut self, c: char) -> bool {
        match self.kind {
            MatcherKind::Naive => {
                if c == self.keyword[self.matched] {
                    self.matched += 1;
                } else {
                    self.matched = 0;
                }
            }
            MatcherKind::PrefixFunction => {
                while self.matched > 0 && c != self.keyword[self.matched] {
                    self.matched = self.failure[self.matched - 1];
                }
                if c == self.keyword[self.matched] {
                    self.matched += 1;
                }
            }
        }

        if self.matched == self.keyword.len() {
            self.matched = match self.kind {
                MatcherKind::Naive => 0,
                MatcherKind::PrefixFunction => self.failure[self.matched - 1],
            };
            return true;
        }
        false
    }

    /// Scans one page, stopping at the first completed match.
    pub fn scan_page(&mut self, text: &str) -> PageScan {
        for (i, c) in text.chars().enumerate() {
            if self.feed(c) {
                return PageScan::Found {
                    end: i,
                    started_on_previous_page: self.keyword.len() > i + 1,
                };
            }
        }
        self.pending_from_previous = self.matched > 0;
        PageScan::NotFound {
            pending: self.pending_from_previous,
        }
    }
}

fn prefix_function(keyword: &[char]) -> Vec<usize> {
    let mut failure = vec![0; keyword.len()];
    let mut k = 0;
    for i in 1..keyword.len() {
        while k > 0 && keyword[i] != keyword[k] {
            k = failure[k - 1];
        }
        if keyword[i] == keyword[k] {
            k += 1;
        }
        failure[i] = k;
    }
    failure
}
