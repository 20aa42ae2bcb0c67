//! Fetching and scraping chapters from novel sites.
//!
//! This module provides:
//! - `Fetcher`, the page transport, and `HttpFetcher` over reqwest
//! - `HtmlSiteAdapter`, a `SiteAdapter` driven by a `SiteProfile`
//! - The built-in `biqu` and `caimo` profiles
//! - `default_sites`, a registry of the built-in adapters

mod fetcher;
mod html;
mod profiles;

pub use fetcher::{Fetcher, HttpFetcher};
pub use html::{HtmlSiteAdapter, SiteProfile, TextCleaner};
pub use profiles::{BIQU, BUILT_IN, CAIMO};

use std::sync::Arc;

use crate::config::ReaderConfig;
use crate::errors::ReaderError;
use crate::source::SiteRegistry;

/// Builds a registry holding every built-in adapter over one fetcher.
///
/// Origins can be overridden per adapter name in `remote.origins`.
pub fn default_sites(config: &ReaderConfig, fetcher: Arc<dyn Fetcher>) -> Result<SiteRegistry, ReaderError> {
    let mut sites = SiteRegistry::new();
    for profile in BUILT_IN {
        let origin = config.remote.origin_for(profile.name);
        sites.register(Arc::new(HtmlSiteAdapter::new(profile, origin, fetcher.clone())?));
    }
    Ok(sites)
}

/// Builds the built-in registry over an [`HttpFetcher`].
pub fn http_sites(config: &ReaderConfig) -> Result<SiteRegistry, ReaderError> {
    default_sites(config, Arc::new(HttpFetcher::new(&config.fetch)?))
}
