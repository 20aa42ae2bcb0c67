//! # Shadowreader
//!
//! A paged reading engine for long texts: local files and chaptered web
//! novels are read through a fixed-size window with a resumable position.
//!
//! Shadowreader provides:
//!
//! - **Uniform paging**: one `ContentSource` contract over local files and
//!   lazily fetched remote chapters
//! - **Resumable positions**: per-book records over a host key/value store,
//!   including records written by older hosts
//! - **Streaming search**: keyword matching that follows a match across a
//!   page boundary
//! - **Auto-advance**: a cancellable timer that turns pages for you
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shadowreader::prelude::*;
//! use std::sync::Arc;
//!
//! let positions = PositionStore::new(Arc::new(MemorySettingsStore::new()));
//! let session = ReadingSession::new(ReaderConfig::default(), positions, SiteRegistry::new())?;
//!
//! session.open("novel.txt").await?;
//! let reading = session.turn_forward(50).await?;
//! println!("{}", reading.display_text());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod auto_advance;
pub mod cancellation;
pub mod config;
pub mod errors;
pub mod observability;
pub mod position;
pub mod search;
pub mod session;
pub mod source;
pub mod testing;

#[cfg(feature = "web")]
pub mod web;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auto_advance::{AdvanceState, AutoAdvance};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{FetchConfig, MatcherKind, ReaderConfig, RetryConfig};
    pub use crate::errors::{NetworkError, ReaderError};
    pub use crate::position::{
        BookIdentity, JsonFileSettingsStore, MemorySettingsStore, PositionRecord, PositionStore,
        SettingsStore,
    };
    pub use crate::search::{PageScan, SearchCursor};
    pub use crate::session::{DisplaySink, Reading, ReadingSession};
    pub use crate::source::{
        Checkpoint, ContentSource, LocalFileSource, Page, RemoteSectionedSource, SectionDocument, SiteAdapter,
        SiteRegistry,
    };

    #[cfg(feature = "web")]
    pub use crate::web::{Fetcher, HtmlSiteAdapter, HttpFetcher};
}
