//! ffarchive: personal archiver for fanfiction.net stories, writing static HTML chapters,
//! an informations page per story, a JSON catalog and statistics pages.

pub mod archive;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod logging;
pub mod marker;
pub mod model;
pub mod planner;
pub mod render;
pub mod scraper;
pub mod stats;
pub mod templates;
pub mod writer;

// Re-exports for CLI and consumers.
pub use archive::{ArchiveError, Archiver, Mode, StoryReport};
pub use catalog::{Catalog, CatalogError, Column, Entry, Filter, Value};
pub use model::{Status, Story};
pub use planner::Plan;
pub use scraper::{
    FanFictionNet, Fetch, PoliteClient, PoliteClientBuilder, ScraperError, SiteAdapter,
    SiteRegistry, UltimateHpFanfiction,
};
pub use writer::{Outcome, StoryWriter, WriteError};
