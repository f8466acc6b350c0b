//! Site adapters and scraping: the shared client, the field map, and an ordered registry of
//! adapters selected by URL.

mod client;
mod error;
pub mod fanfiction;
pub mod fields;
pub mod uhp;

pub use client::{clean_whitespace, Fetch, PoliteClient, PoliteClientBuilder, DEFAULT_RETRY_COUNT};
pub use error::{ErrorKind, ScraperError};
pub use fanfiction::FanFictionNet;
pub use uhp::UltimateHpFanfiction;

use crate::model::Story;

/// One supported site: URL matching, story page extraction and chapter splitting.
///
/// `parse_story` and `split_chapter` are pure; the provided `fetch_*` methods add I/O.
pub trait SiteAdapter {
    /// Site name, also used as the site directory and in catalog rows.
    fn name(&self) -> &'static str;

    /// True when `input` (URL or bare id) belongs to this site.
    fn matches(&self, input: &str) -> bool;

    /// Canonical story URL for `input`. Never depends on the story title.
    fn canonical_url(&self, input: &str) -> Result<String, ScraperError>;

    /// URL of chapter `chapter` (1-based).
    fn chapter_url(&self, story: &Story, chapter: u32) -> String;

    /// Build a [Story] from the story page fetched at `url`.
    fn parse_story(&self, url: &str, html: &str) -> Result<Story, ScraperError>;

    /// Cut a chapter page down to the story text container.
    fn split_chapter(&self, html: &str, chapter_count: u32) -> Result<String, ScraperError>;

    /// Resolve `input`, fetch the story page and extract it.
    fn fetch_story(&self, fetcher: &mut dyn Fetch, input: &str) -> Result<Story, ScraperError> {
        let url = self.canonical_url(input)?;
        let html = fetcher.fetch(&url)?;
        self.parse_story(&url, &html)
    }

    /// Fetch chapter `chapter` and return its body. Out-of-range numbers are rejected before I/O.
    fn fetch_chapter(
        &self,
        fetcher: &mut dyn Fetch,
        story: &Story,
        chapter: u32,
    ) -> Result<String, ScraperError> {
        if chapter == 0 || chapter > story.chapter_count {
            return Err(ScraperError::ChapterOutOfRange {
                chapter,
                count: story.chapter_count,
            });
        }
        let url = self.chapter_url(story, chapter);
        let html = fetcher.fetch(&url)?;
        self.split_chapter(&html, story.chapter_count)
            .map_err(|e| e.at_url(&url))
    }
}

/// Ordered list of adapters. The first adapter whose matcher accepts the input wins, so
/// stricter matchers must come before looser ones for the same host.
pub struct SiteRegistry {
    adapters: Vec<Box<dyn SiteAdapter>>,
}

impl SiteRegistry {
    pub fn new(adapters: Vec<Box<dyn SiteAdapter>>) -> Self {
        Self { adapters }
    }

    /// Registry with every built-in adapter.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Box::new(FanFictionNet::new()),
            Box::new(UltimateHpFanfiction::new()),
        ])
    }

    /// First adapter matching `input`.
    pub fn resolve(&self, input: &str) -> Result<&dyn SiteAdapter, ScraperError> {
        self.adapters
            .iter()
            .find(|a| a.matches(input))
            .map(|a| a.as_ref())
            .ok_or_else(|| ScraperError::UnsupportedSite {
                input: input.trim().to_string(),
            })
    }

    /// Adapter registered under `name`.
    pub fn by_name(&self, name: &str) -> Option<&dyn SiteAdapter> {
        self.adapters
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    pub fn site_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
