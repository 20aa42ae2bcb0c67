//! A site adapter for chapter pages laid out as plain HTML.

use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::fetcher::Fetcher;
use crate::errors::{NetworkError, ReaderError};
use crate::position::BookIdentity;
use crate::source::{SectionDocument, SiteAdapter};

/// Page layout of one novel site.
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    /// Adapter name, also the key for origin overrides.
    pub name: &'static str,
    /// Origin used when none is configured.
    pub default_origin: &'static str,
    /// Selector for the chapter text container.
    pub content: &'static str,
    /// Selector for the chapter heading.
    pub title: &'static str,
    /// Selector for the previous/next navigation anchors.
    pub navigation: &'static str,
    /// Selector for chapter anchors on the catalog page.
    pub catalog: &'static str,
    /// Anchor labels meaning "next chapter".
    pub next_labels: &'static [&'static str],
    /// Anchor labels meaning "previous chapter".
    pub prev_labels: &'static [&'static str],
    /// Patterns for lines the site injects into chapter text.
    pub boilerplate: &'static [&'static str],
}

/// Turns scraped text into clean paragraphs.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    spaces: Regex,
    boilerplate: Vec<Regex>,
}

impl TextCleaner {
    /// Compiles the cleaner with patterns for lines to drop.
    pub fn new(boilerplate: &[&str]) -> Result<Self, ReaderError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ReaderError::InvalidConfig(format!("pattern '{pattern}': {e}")))
        };
        Ok(Self {
            spaces: compile(r"\s+")?,
            boilerplate: boilerplate.iter().map(|p| compile(p)).collect::<Result<_, _>>()?,
        })
    }

    /// Collapses whitespace, drops empty and boilerplate lines, and joins
    /// paragraphs with newlines.
    #[must_use]
    pub fn clean<'a>(&self, fragments: impl IntoIterator<Item = &'a str>) -> String {
        fragments
            .into_iter()
            .flat_map(str::lines)
            .map(|line| self.spaces.replace_all(line, " ").trim().to_string())
            .filter(|line| !line.is_empty())
            .filter(|line| !self.boilerplate.iter().any(|re| re.is_match(line)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct CompiledProfile {
    content: Selector,
    title: Selector,
    navigation: Selector,
    catalog: Selector,
}

fn selector(css: &str) -> Result<Selector, ReaderError> {
    Selector::parse(css).map_err(|e| ReaderError::InvalidConfig(format!("selector '{css}': {e:?}")))
}

/// Adapter for a site described by a [`SiteProfile`].
///
/// Chapter position comes from the book's catalog page, fetched once per
/// book and cached.
pub struct HtmlSiteAdapter {
    profile: SiteProfile,
    origin: String,
    selectors: CompiledProfile,
    cleaner: TextCleaner,
    fetcher: Arc<dyn Fetcher>,
    /// Chapter locators per book root, in reading order.
    catalogs: DashMap<String, Arc<Vec<String>>>,
}

impl HtmlSiteAdapter {
    /// Creates an adapter serving `origin`, or the profile's default.
    pub fn new(
        profile: SiteProfile,
        origin: Option<&str>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, ReaderError> {
        Ok(Self {
            profile,
            origin: origin.unwrap_or(profile.default_origin).to_string(),
            selectors: CompiledProfile {
                content: selector(profile.content)?,
                title: selector(profile.title)?,
                navigation: selector(profile.navigation)?,
                catalog: selector(profile.catalog)?,
            },
            cleaner: TextCleaner::new(profile.boilerplate)?,
            fetcher,
            catalogs: DashMap::new(),
        })
    }

    /// The origin this adapter claims.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Extracts a chapter from its HTML.
    pub fn parse_chapter(&self, locator: &str, html: &str) -> Result<SectionDocument, ReaderError> {
        let base = parse_url(locator)?;
        let root = book_root(&base);
        let doc = Html::parse_document(html);

        let text = doc
            .select(&self.selectors.content)
            .next()
            .map(|content| self.cleaner.clean(content.text()))
            .unwrap_or_default();

        let mut section = SectionDocument::new(text);
        section.title = doc
            .select(&self.selectors.title)
            .next()
            .map(|heading| self.cleaner.clean(heading.text()))
            .filter(|title| !title.is_empty());

        for anchor in doc.select(&self.selectors.navigation) {
            let label = anchor_label(&anchor);
            let Some(target) = resolve_href(&base, &anchor) else {
                continue;
            };
            // The last chapter links "next" back to the catalog.
            if Some(target.as_str()) == root.as_deref() {
                continue;
            }
            if section.next.is_none() && self.profile.next_labels.iter().any(|l| label.contains(l)) {
                section.next = Some(target.into());
            } else if section.prev.is_none() && self.profile.prev_labels.iter().any(|l| label.contains(l)) {
                section.prev = Some(target.into());
            }
        }
        Ok(section)
    }

    /// Extracts chapter locators from a catalog page, in reading order.
    ///
    /// Sites list the newest chapters above the full index; those repeats
    /// are dropped so only the last occurrence of each locator is kept.
    pub fn parse_catalog(&self, catalog_url: &str, html: &str) -> Result<Vec<String>, ReaderError> {
        let base = parse_url(catalog_url)?;
        let doc = Html::parse_document(html);

        let all: Vec<String> = doc
            .select(&self.selectors.catalog)
            .filter_map(|anchor| resolve_href(&base, &anchor))
            .map(String::from)
            .collect();

        let mut seen = HashSet::new();
        let mut chapters: Vec<String> = all
            .into_iter()
            .rev()
            .filter(|locator| seen.insert(locator.clone()))
            .collect();
        chapters.reverse();
        Ok(chapters)
    }

    async fn catalog_for(&self, locator: &str) -> Option<Arc<Vec<String>>> {
        let root = book_root(&parse_url(locator).ok()?)?;
        if let Some(cached) = self.catalogs.get(&root) {
            return Some(cached.clone());
        }

        match self.fetch_catalog(&root).await {
            Ok(chapters) => Some(chapters),
            Err(e) => {
                debug!(root = %root, error = %e, "Catalog unavailable, progress will be estimated");
                self.catalogs.insert(root, Arc::new(Vec::new()));
                None
            }
        }
    }

    async fn fetch_catalog(&self, catalog_url: &str) -> Result<Arc<Vec<String>>, ReaderError> {
        let html = self.fetcher.fetch(catalog_url).await?;
        let chapters = Arc::new(self.parse_catalog(catalog_url, &html)?);
        let Some(first) = chapters.first() else {
            return Err(NetworkError {
                url: catalog_url.to_string(),
                status: None,
                message: "catalog lists no chapters".to_string(),
                retryable: false,
            }
            .into());
        };
        if let Some(root) = book_root(&parse_url(first)?) {
            self.catalogs.insert(root, chapters.clone());
        }
        debug!(site = self.profile.name, chapters = chapters.len(), "Loaded catalog");
        Ok(chapters)
    }
}

#[async_trait]
impl SiteAdapter for HtmlSiteAdapter {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn matches_origin(&self, locator: &str) -> bool {
        locator.starts_with(&self.origin)
    }

    async fn resolve_first_section(&self, identity: &BookIdentity) -> Result<String, ReaderError> {
        let chapters = self.fetch_catalog(identity.as_str()).await?;
        chapters
            .first()
            .cloned()
            .ok_or_else(|| NetworkError::new(identity.as_str(), "catalog lists no chapters").into())
    }

    async fn fetch_and_extract(&self, locator: &str) -> Result<SectionDocument, ReaderError> {
        let html = self.fetcher.fetch(locator).await?;
        let mut section = self.parse_chapter(locator, &html)?;

        if let Some(chapters) = self.catalog_for(locator).await {
            if let Some(index) = chapters.iter().position(|c| c == locator) {
                let ordinal = u32::try_from(index).unwrap_or(u32::MAX);
                let count = u32::try_from(chapters.len()).unwrap_or(u32::MAX);
                section = section.with_position(ordinal, count);
            }
        }
        Ok(section)
    }
}

impl std::fmt::Debug for HtmlSiteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlSiteAdapter")
            .field("name", &self.profile.name)
            .field("origin", &self.origin)
            .field("cached_catalogs", &self.catalogs.len())
            .finish_non_exhaustive()
    }
}

fn parse_url(locator: &str) -> Result<Url, ReaderError> {
    Url::parse(locator).map_err(|e| ReaderError::unsupported_origin(format!("{locator} ({e})")))
}

/// The directory holding a chapter page, which is where sites put the catalog.
fn book_root(url: &Url) -> Option<String> {
    url.join("./").ok().map(String::from)
}

fn anchor_label(anchor: &ElementRef<'_>) -> String {
    anchor.text().collect::<String>().trim().to_string()
}

fn resolve_href(base: &Url, anchor: &ElementRef<'_>) -> Option<Url> {
    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok()
}
