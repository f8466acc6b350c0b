//! Per-story and batch orchestration: resolve the site, fetch and extract the story,
//! record it in the catalog, then download, update or refresh it on disk.

use crate::catalog::{Catalog, CatalogError, Column, Entry};
use crate::scraper::{ErrorKind, Fetch, ScraperError, SiteRegistry};
use crate::writer::{Outcome, Progress, StoryWriter, WriteError};
use std::path::Path;
use thiserror::Error;

/// Exit code when at least one story of a batch failed.
pub const BATCH_FAILURE_EXIT_CODE: i32 = 4;

/// What to do with a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Full download, replacing any previous copy.
    Download,
    /// Incremental update; downloads stories not yet on disk.
    Update,
    /// Refresh the informations page and marker of an archived story.
    Informations,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Write(#[from] WriteError),

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    #[error("Story is not in the catalog: {url}. Download it first.")]
    NotDownloaded { url: String },
}

fn scraper_exit_code(e: &ScraperError) -> i32 {
    match e.kind() {
        ErrorKind::Input => 1,
        ErrorKind::Fetch | ErrorKind::Parse | ErrorKind::Markup => 2,
    }
}

impl ArchiveError {
    /// 1 invalid input, 2 fetch/parse/markup, 3 filesystem or catalog.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArchiveError::Scraper(e) | ArchiveError::Write(WriteError::Scraper(e)) => {
                scraper_exit_code(e)
            }
            ArchiveError::NotDownloaded { .. } => 1,
            ArchiveError::Write(WriteError::MissingStoryDir { .. }) => 1,
            ArchiveError::Write(_) | ArchiveError::Catalog(_) => 3,
        }
    }
}

/// Result of one story within a batch.
#[derive(Debug)]
pub struct StoryReport {
    pub input: String,
    pub result: Result<Outcome, ArchiveError>,
}

/// 0 when every story succeeded, [BATCH_FAILURE_EXIT_CODE] otherwise.
pub fn batch_exit_code(reports: &[StoryReport]) -> i32 {
    if reports.iter().all(|r| r.result.is_ok()) {
        0
    } else {
        BATCH_FAILURE_EXIT_CODE
    }
}

/// Runs stories through the pipeline, one at a time.
pub struct Archiver<'a> {
    library: &'a Path,
    registry: &'a SiteRegistry,
    catalog: &'a mut Catalog,
    fetcher: &'a mut dyn Fetch,
    progress: Option<Progress<'a>>,
    written_at: Option<String>,
}

impl<'a> Archiver<'a> {
    pub fn new(
        library: &'a Path,
        registry: &'a SiteRegistry,
        catalog: &'a mut Catalog,
        fetcher: &'a mut dyn Fetch,
    ) -> Self {
        Self {
            library,
            registry,
            catalog,
            fetcher,
            progress: None,
            written_at: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<Progress<'a>>) -> Self {
        self.progress = progress;
        self
    }

    /// Fix the timestamp printed on informations pages.
    pub fn with_written_at(mut self, written_at: impl Into<String>) -> Self {
        self.written_at = Some(written_at.into());
        self
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    /// Process one story. Input errors are raised before any network access.
    pub fn process_story(&mut self, input: &str, mode: Mode) -> Result<Outcome, ArchiveError> {
        let registry = self.registry;
        let adapter = registry.resolve(input)?;
        let url = adapter.canonical_url(input)?;
        if mode == Mode::Informations && !self.catalog.contains(&url) {
            return Err(ArchiveError::NotDownloaded { url });
        }

        let story = adapter.fetch_story(&mut *self.fetcher, &url)?;
        tracing::info!(url = %story.url, title = %story.title, chapters = story.chapter_count, "story fetched");
        self.catalog.upsert(Entry::from_story(&story))?;

        let mut writer = StoryWriter::new(self.library, adapter, &mut *self.fetcher)
            .with_progress(self.progress);
        if let Some(at) = &self.written_at {
            writer = writer.with_written_at(at.clone());
        }
        let outcome = match mode {
            Mode::Download => writer.download(&story)?,
            Mode::Update => writer.update(&story)?,
            Mode::Informations => {
                writer.adopt_renamed_dir(&story)?;
                writer.write_assets()?;
                writer.write_informations(&story)?;
                Outcome::InformationsRefreshed
            }
        };
        tracing::info!(url = %story.url, ?outcome, "story processed");
        Ok(outcome)
    }

    /// Process every input in order; a failing story does not stop the batch.
    pub fn process_batch<S: AsRef<str>>(&mut self, inputs: &[S], mode: Mode) -> Vec<StoryReport> {
        inputs
            .iter()
            .map(|input| {
                let input = input.as_ref();
                let result = self.process_story(input, mode);
                if let Err(e) = &result {
                    tracing::warn!(input, error = %e, "story failed");
                }
                StoryReport {
                    input: input.to_string(),
                    result,
                }
            })
            .collect()
    }

    /// Update every story in the catalog.
    pub fn update_all(&mut self) -> Vec<StoryReport> {
        let urls: Vec<String> = self
            .catalog
            .query(Column::Url, false, None)
            .into_iter()
            .filter_map(|v| v.as_text().map(str::to_string))
            .collect();
        tracing::info!(stories = urls.len(), "updating every cataloged story");
        self.process_batch(&urls, Mode::Update)
    }
}
