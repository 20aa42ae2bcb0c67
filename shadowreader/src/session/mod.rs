//! Reading sessions: the active book, page turns and search.
//!
//! This module provides:
//! - `ReadingSession`, owning the single active content source
//! - `Reading`, a delivered page with its progress
//! - `DisplaySink`, the host callback for display updates

mod reader;
mod reading;
#[cfg(test)]
mod session_tests;

pub use reader::ReadingSession;
pub use reading::{format_percent, DisplaySink, Reading};
