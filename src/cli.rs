//! CLI parsing and orchestration. Parses args, runs the archive, catalog and statistics
//! commands, and maps outcomes and errors to exit codes.

use crate::archive::{batch_exit_code, ArchiveError, Archiver, Mode, StoryReport};
use crate::catalog::{Catalog, CatalogError, Entry};
use crate::config::{self, Config};
use crate::scraper::{PoliteClient, SiteRegistry};
use crate::stats::{self, StatsError};
use crate::writer::{self, Outcome, WriteError};
use clap::{Parser, Subcommand};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CATALOG_FILE_NAME: &str = "catalog.json";

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Archive(#[from] ArchiveError),

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    Write(#[from] WriteError),

    #[error("{0}")]
    Stats(#[from] StatsError),

    #[error("{failed} of {total} stories failed")]
    Batch { failed: usize, total: usize },
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Archive(e) => e.exit_code(),
            CliRunError::Catalog(_) | CliRunError::Write(_) | CliRunError::Stats(_) => 3,
            CliRunError::Batch { .. } => crate::archive::BATCH_FAILURE_EXIT_CODE,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ffarchive")]
#[command(about = "Archive fanfiction.net stories as static HTML, with a catalog and statistics")]
#[command(
    after_help = "Config file keys (library_dir, catalog_file, user_agent, request_delay_secs, timeout_secs, retry_count, retry_backoff_secs) are read from ./ffarchive.toml or the user config directory. CLI flags override config.\n\nExit codes: 0 downloaded, 20 updated, 21 already up to date, 1 invalid input, 2 fetch or parse failure, 3 filesystem or catalog failure, 4 some stories of a batch failed."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Library root directory (overrides config; default: current directory).
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    /// Catalog file (overrides config; default: {library}/catalog.json).
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// HTTP User-Agent (overrides config).
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Delay between requests in seconds (overrides config; default 1).
    #[arg(long, global = true)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Suppress progress output (errors only).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging and the full error chain.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download stories, replacing any previous copy.
    Download {
        /// Story URL or numeric id.
        #[arg(required = true)]
        stories: Vec<String>,
    },
    /// Fetch new chapters of archived stories.
    Update {
        /// Update every story in the catalog.
        #[arg(long, conflicts_with_all = ["stories", "dir"])]
        all: bool,
        /// Update every story archived directly under this directory (repeatable).
        #[arg(long, conflicts_with = "stories")]
        dir: Vec<PathBuf>,
        /// Story URL or numeric id.
        stories: Vec<String>,
    },
    /// Rewrite the informations page and marker of archived stories.
    Informations {
        #[arg(required = true)]
        stories: Vec<String>,
    },
    /// Remove stories from disk and from the catalog.
    Delete {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Mark stories as read or unread.
    Mark {
        /// read or unread.
        #[arg(value_parser = parse_read_state)]
        state: ReadState,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Manage series.
    Series {
        #[command(subcommand)]
        action: SeriesCommand,
    },
    /// List cataloged stories.
    List {
        #[arg(long)]
        site: Option<String>,
    },
    /// Write statistics pages. Without options, one page per supported site.
    Stats {
        /// Site statistics from the catalog.
        #[arg(long)]
        site: Option<String>,
        /// Statistics of a directory of archived stories. Repeat to also write one
        /// page covering every directory.
        #[arg(long)]
        dir: Vec<PathBuf>,
        /// Directory receiving the page that covers every --dir (default: library root).
        #[arg(long, requires = "dir")]
        to: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SeriesCommand {
    /// Append stories to a series, in order.
    Add {
        name: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Dissolve a series; its stories stay archived.
    Delete { name: String },
    /// Print every series with its stories.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Read,
    Unread,
}

fn parse_read_state(s: &str) -> Result<ReadState, String> {
    match s.to_lowercase().as_str() {
        "read" => Ok(ReadState::Read),
        "unread" => Ok(ReadState::Unread),
        _ => Err(format!("Invalid state: '{}'. Use read or unread.", s)),
    }
}

/// Library root and catalog file after applying flags over config.
fn resolve_paths(args: &Args, config: &Config) -> (PathBuf, PathBuf) {
    let library = args
        .library
        .clone()
        .or_else(|| config.library_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let catalog = args
        .catalog
        .clone()
        .or_else(|| config.catalog_file.clone())
        .unwrap_or_else(|| library.join(CATALOG_FILE_NAME));
    (library, catalog)
}

fn build_client(args: &Args, config: &Config) -> Result<PoliteClient, CliRunError> {
    let mut builder = PoliteClient::builder();
    if let Some(delay) = args.delay.or(config.request_delay_secs) {
        builder = builder.delay_secs(delay);
    }
    if let Some(timeout) = args.timeout.or(config.timeout_secs) {
        builder = builder.timeout_secs(timeout);
    }
    if let Some(count) = config.retry_count {
        builder = builder.retry_count(count);
    }
    if let Some(backoff) = config.retry_backoff_secs.clone() {
        builder = builder.retry_backoff_secs(backoff);
    }
    if let Some(ua) = args.user_agent.clone().or_else(|| config.user_agent.clone()) {
        builder = builder.user_agent(ua);
    }
    builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))
}

/// Canonical catalog URLs for `inputs`. Unsupported or malformed inputs are input errors.
fn canonical_urls(registry: &SiteRegistry, inputs: &[String]) -> Result<Vec<String>, CliRunError> {
    inputs
        .iter()
        .map(|input| {
            registry
                .resolve(input)
                .and_then(|adapter| adapter.canonical_url(input))
                .map_err(|e| CliRunError::InvalidInput(e.to_string()))
        })
        .collect()
}

fn not_in_catalog(urls: &[String]) -> Result<(), CliRunError> {
    if urls.is_empty() {
        Ok(())
    } else {
        Err(CliRunError::InvalidInput(format!(
            "Not in the catalog: {}",
            urls.join(", ")
        )))
    }
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Downloaded { chapters } => format!("downloaded ({} chapters)", chapters),
        Outcome::Updated { chapters } => format!("updated ({} chapters fetched)", chapters),
        Outcome::UpToDate => "already up to date".to_string(),
        Outcome::InformationsRefreshed => "informations refreshed".to_string(),
    }
}

/// Exit code of a finished run: the outcome of a lone story, else the batch status.
fn finish(mut reports: Vec<StoryReport>, quiet: bool) -> Result<i32, CliRunError> {
    let total = reports.len();
    for report in &reports {
        match &report.result {
            Ok(outcome) if !quiet => eprintln!("{}: {}", report.input, describe(outcome)),
            Ok(_) => {}
            // A lone failure is printed by the caller.
            Err(e) if total > 1 => eprintln!("{}: {}", report.input, e),
            Err(_) => {}
        }
    }
    if total == 1 {
        if let Some(report) = reports.pop() {
            return Ok(report.result?.exit_code());
        }
    }
    match batch_exit_code(&reports) {
        0 => Ok(0),
        _ => Err(CliRunError::Batch {
            failed: reports.iter().filter(|r| r.result.is_err()).count(),
            total,
        }),
    }
}

/// Entry point for the CLI. Returns the process exit code on success.
pub fn run(args: &Args) -> Result<i32, CliRunError> {
    let config = config::load_config()
        .map_err(CliRunError::InvalidInput)?
        .unwrap_or_default();
    execute(args, &config)
}

fn execute(args: &Args, config: &Config) -> Result<i32, CliRunError> {
    let (library, catalog_path) = resolve_paths(args, config);
    let registry = SiteRegistry::with_defaults();
    let mut catalog = Catalog::open(&catalog_path)?;
    tracing::debug!(library = %library.display(), catalog = %catalog_path.display(), "paths resolved");

    match &args.command {
        Command::Download { stories } => {
            let archive = Archive::new(args, config, &library, &registry);
            archive.run(&mut catalog, Some(stories.as_slice()), Mode::Download)
        }
        Command::Update { all: true, .. } => {
            let archive = Archive::new(args, config, &library, &registry);
            archive.run(&mut catalog, None, Mode::Update)
        }
        Command::Update { dir, stories, .. } => {
            let stories = if dir.is_empty() {
                stories.clone()
            } else {
                urls_in_dirs(dir)?
            };
            if stories.is_empty() {
                return Err(CliRunError::InvalidInput(
                    "Nothing to update: give story URLs, --dir or --all.".to_string(),
                ));
            }
            let archive = Archive::new(args, config, &library, &registry);
            archive.run(&mut catalog, Some(stories.as_slice()), Mode::Update)
        }
        Command::Informations { stories } => {
            let archive = Archive::new(args, config, &library, &registry);
            archive.run(&mut catalog, Some(stories.as_slice()), Mode::Informations)
        }
        Command::Delete { urls } => delete(&library, &registry, &mut catalog, urls, args.quiet),
        Command::Mark { state, urls } => {
            let mut missing = Vec::new();
            for url in canonical_urls(&registry, urls)? {
                if !catalog.set_read(&url, *state == ReadState::Read)? {
                    missing.push(url);
                }
            }
            not_in_catalog(&missing)?;
            Ok(0)
        }
        Command::Series { action } => series(action, &registry, &mut catalog),
        Command::List { site } => {
            list(&catalog, site.as_deref());
            Ok(0)
        }
        Command::Stats { site, dir, to } => {
            let now = chrono::Local::now().naive_local();
            let mut written = Vec::new();
            for d in dir {
                written.push(stats::write_directory_statistics(d, now)?);
            }
            let target = to.as_deref().unwrap_or(&library);
            // A target that is one of the directories already holds its own page.
            if (dir.len() > 1 || to.is_some()) && !dir.iter().any(|d| d == target) {
                written.push(stats::write_statistics(dir, target, now)?);
            }
            if !args.quiet {
                for path in &written {
                    eprintln!("Wrote {}", path.display());
                }
            }
            let sites: Vec<String> = match site {
                Some(site) => vec![site.clone()],
                None if !dir.is_empty() => Vec::new(),
                None => registry.site_names().into_iter().map(String::from).collect(),
            };
            for site in sites {
                match stats::write_site_statistics(&library, &catalog, &site)? {
                    Some(path) if !args.quiet => eprintln!("Wrote {}", path.display()),
                    Some(_) => {}
                    None => eprintln!("No stories saved for {}", site),
                }
            }
            Ok(0)
        }
    }
}

/// Story URLs read from the marker files under each directory, without repeats.
fn urls_in_dirs(dirs: &[PathBuf]) -> Result<Vec<String>, CliRunError> {
    let mut urls: Vec<String> = Vec::new();
    for dir in dirs {
        let found = stats::DirectoryStatistics::collect(dir)?.urls();
        tracing::info!(dir = %dir.display(), stories = found.len(), "stories found in directory");
        for url in found {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    Ok(urls)
}

/// Settings shared by the download, update and informations commands.
struct Archive<'a> {
    args: &'a Args,
    config: &'a Config,
    library: &'a Path,
    registry: &'a SiteRegistry,
}

impl<'a> Archive<'a> {
    fn new(
        args: &'a Args,
        config: &'a Config,
        library: &'a Path,
        registry: &'a SiteRegistry,
    ) -> Self {
        Self {
            args,
            config,
            library,
            registry,
        }
    }

    /// Process `stories`; `None` updates the whole catalog.
    fn run(
        &self,
        catalog: &mut Catalog,
        stories: Option<&[String]>,
        mode: Mode,
    ) -> Result<i32, CliRunError> {
        let args = self.args;
        let mut client = build_client(args, self.config)?;

        let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
        let progress_cb = |n: u32, total: u32| {
            if total == 0 {
                return;
            }
            let mut state = progress_state.borrow_mut();
            // A new story starts its own bar.
            let stale = state.as_ref().is_some_and(|pb| {
                pb.length() != Some(u64::from(total)) || pb.position() >= u64::from(n)
            });
            if stale {
                if let Some(pb) = state.take() {
                    pb.finish_and_clear();
                }
            }
            let pb = state.get_or_insert_with(|| {
                let bar = indicatif::ProgressBar::new(u64::from(total));
                if let Ok(style) = indicatif::ProgressStyle::default_bar()
                    .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
                {
                    bar.set_style(
                        style
                            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                            .progress_chars("█▉▊▋▌▍▎▏ "),
                    );
                }
                bar.enable_steady_tick(Duration::from_millis(80));
                bar
            });
            pb.set_position(u64::from(n));
            pb.set_message(format!("Fetching chapter {}/{}", n, total));
        };
        let progress: Option<&dyn Fn(u32, u32)> = if args.quiet { None } else { Some(&progress_cb) };

        let reports = {
            let mut archiver = Archiver::new(self.library, self.registry, catalog, &mut client)
                .with_progress(progress);
            match stories {
                Some(stories) => archiver.process_batch(stories, mode),
                None => archiver.update_all(),
            }
        };

        if let Some(pb) = progress_state.borrow_mut().take() {
            pb.disable_steady_tick();
            pb.finish_and_clear();
        }
        finish(reports, args.quiet)
    }
}

fn delete(
    library: &Path,
    registry: &SiteRegistry,
    catalog: &mut Catalog,
    urls: &[String],
    quiet: bool,
) -> Result<i32, CliRunError> {
    let mut missing = Vec::new();
    for url in canonical_urls(registry, urls)? {
        let Some(entry) = catalog.entry(&url).cloned() else {
            missing.push(url);
            continue;
        };
        if let Some(story_dir) = library.join(&entry.path_to_index).parent() {
            writer::delete_story_dir(story_dir)?;
        }
        catalog.delete(&url)?;
        tracing::info!(url = %url, "story deleted");
        if !quiet {
            eprintln!("Deleted {}", entry.title);
        }
    }
    not_in_catalog(&missing)?;
    Ok(0)
}

fn series(
    action: &SeriesCommand,
    registry: &SiteRegistry,
    catalog: &mut Catalog,
) -> Result<i32, CliRunError> {
    match action {
        SeriesCommand::Add { name, urls } => {
            if name.trim().is_empty() {
                return Err(CliRunError::InvalidInput(
                    "Series name cannot be empty.".to_string(),
                ));
            }
            let mut missing = Vec::new();
            for url in canonical_urls(registry, urls)? {
                if !catalog.add_to_series(name, &url)? {
                    missing.push(url);
                }
            }
            not_in_catalog(&missing)?;
        }
        SeriesCommand::Delete { name } => {
            let count = catalog.delete_series(name)?;
            if count == 0 {
                return Err(CliRunError::InvalidInput(format!("No such series: {}", name)));
            }
        }
        SeriesCommand::List => {
            for line in series_lines(catalog.all()) {
                println!("{}", line);
            }
        }
    }
    Ok(0)
}

/// Series names in order, each followed by its stories by position.
fn series_lines(entries: &[Entry]) -> Vec<String> {
    let mut members: Vec<&Entry> = entries.iter().filter(|e| !e.series.is_empty()).collect();
    members.sort_by(|a, b| a.series.cmp(&b.series).then(a.position.cmp(&b.position)));
    let mut lines = Vec::new();
    let mut current: Option<&str> = None;
    for e in members {
        if current != Some(e.series.as_str()) {
            lines.push(e.series.clone());
            current = Some(e.series.as_str());
        }
        lines.push(format!("  {}. {} ({})", e.position, e.title, e.url));
    }
    lines
}

fn list(catalog: &Catalog, site: Option<&str>) {
    let entries = match site {
        Some(site) => catalog.stories_for_site(site),
        None => {
            let mut all = catalog.all().to_vec();
            all.sort_by(|a, b| a.site.cmp(&b.site).then_with(|| a.title.cmp(&b.title)));
            all
        }
    };
    for e in entries {
        println!(
            "{} | {} | {} | {} chapters | {} | {}",
            e.title,
            e.author,
            e.status,
            e.chapter_count,
            if e.read { "read" } else { "unread" },
            e.url
        );
    }
}
