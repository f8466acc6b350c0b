//! Statistics pages: per site from the catalog, per directory (or several directories
//! together) from marker files.

use crate::catalog::{Catalog, Entry};
use crate::marker::{Marker, MarkerError};
use crate::model::Status;
use crate::render::WRITTEN_AT_FORMAT;
use crate::templates::{self, DirectoryStory, SiteRow, SiteTotals};
use crate::writer::{self, WriteError};
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static MARKER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.\d+$").expect("static regex"));
static STATS_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^stats_.*\d{4}-\d{2}-\d{2}\.html$").expect("static regex"));

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{0}")]
    Marker(#[from] MarkerError),

    #[error("{0}")]
    Write(#[from] WriteError),

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("No directory given for statistics.")]
    NoDirectories,
}

/// Totals and table rows of one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteStatistics {
    pub totals: SiteTotals,
    pub rows: String,
}

fn series_cell(entry: &Entry) -> String {
    if entry.series.is_empty() {
        "-".to_string()
    } else {
        format!("{}: n° {}", entry.series, entry.position)
    }
}

/// Compute the statistics of `site`; `None` when it has no stories.
pub fn site_statistics(catalog: &Catalog, site: &str) -> Option<SiteStatistics> {
    let entries = catalog.stories_for_site(site);
    if entries.is_empty() {
        return None;
    }
    let distinct = |f: fn(&Entry) -> &str| {
        entries
            .iter()
            .map(f)
            .collect::<BTreeSet<_>>()
            .len()
    };
    let read = entries.iter().filter(|e| e.read).count();
    let totals = SiteTotals {
        authors: distinct(|e| e.author.as_str()),
        universes: distinct(|e| e.universe.as_str()),
        chapters: entries.iter().map(|e| u64::from(e.chapter_count)).sum(),
        words: entries.iter().map(|e| e.word_count).sum(),
        stories: entries.len(),
        read,
        unread: entries.len() - read,
        series: entries
            .iter()
            .filter(|e| !e.series.is_empty())
            .map(|e| e.series.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
    };

    let mut rows = String::new();
    for (i, entry) in entries.iter().enumerate() {
        let status = Status::from_lenient(&entry.status);
        let series = series_cell(entry);
        rows.push_str(&templates::site_statistics_row(&SiteRow {
            num: i + 1,
            title: &entry.title,
            informations_path: &entry.path_to_index,
            url: &entry.url,
            summary: &entry.summary,
            read: entry.read,
            author: &entry.author,
            universe: &entry.universe,
            status: status.as_str(),
            status_class: status.css_class(),
            chapter_count: entry.chapter_count,
            word_count: entry.word_count,
            curated_tokens: &entry.curated_tokens,
            series: &series,
        }));
    }
    Some(SiteStatistics { totals, rows })
}

/// Write `{library}/{site}_statistics.html` and the shared assets.
/// Returns the page path, or `None` when the site has no stories.
pub fn write_site_statistics(
    library: &Path,
    catalog: &Catalog,
    site: &str,
) -> Result<Option<PathBuf>, StatsError> {
    let Some(stats) = site_statistics(catalog, site) else {
        tracing::warn!(site, "no stories saved for this site, statistics not written");
        return Ok(None);
    };
    writer::write_assets(library)?;
    let path = library.join(format!("{}_statistics.html", site));
    std::fs::write(
        &path,
        templates::site_statistics_page(site, &stats.totals, &stats.rows),
    )
    .map_err(|e| StatsError::Io {
        path: path.clone(),
        source: e,
    })?;
    tracing::info!(site, stories = stats.totals.stories, path = %path.display(), "site statistics written");
    Ok(Some(path))
}

/// One story found in a directory, keyed by its directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dir_name: String,
    pub numeric_id: String,
    /// Informations page relative to the directory, or the story URL on aggregate pages.
    pub link: String,
    pub marker: Marker,
}

/// Stories of a directory and their aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryStatistics {
    /// Sorted by directory name.
    pub stories: Vec<DirectoryEntry>,
    /// Story count per universe.
    pub universes: BTreeMap<String, usize>,
    pub chapters: u64,
    pub words: u64,
}

impl DirectoryStatistics {
    /// Read the marker of every story directory directly under `dir`.
    pub fn collect(dir: &Path) -> Result<Self, StatsError> {
        if !dir.is_dir() {
            return Err(StatsError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        let mut stories = Vec::new();
        for entry in walkdir::WalkDir::new(dir).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| StatsError::Walk {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let name = entry.file_name().to_string_lossy();
            if !entry.file_type().is_file() || !MARKER_NAME.is_match(&name) {
                continue;
            }
            let Some(dir_name) = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            let marker = Marker::read(entry.path())?;
            tracing::debug!(story = %marker.title, "registered for statistics");
            stories.push(DirectoryEntry {
                dir_name,
                numeric_id: name.trim_start_matches('.').to_string(),
                link: marker.informations_path.clone(),
                marker,
            });
        }
        Ok(Self::from_entries(stories))
    }

    /// Stories of several directories on one page. A story found in more than one
    /// directory counts once, with the marker of the last directory. Links point to the
    /// story URLs since the page does not live next to the story directories.
    pub fn from_dirs(dirs: &[PathBuf]) -> Result<Self, StatsError> {
        match dirs {
            [] => Err(StatsError::NoDirectories),
            [dir] => Self::collect(dir),
            _ => {
                let mut by_url: BTreeMap<String, DirectoryEntry> = BTreeMap::new();
                for dir in dirs {
                    for mut entry in Self::collect(dir)?.stories {
                        entry.link = entry.marker.url.clone();
                        by_url.insert(entry.marker.url.clone(), entry);
                    }
                }
                Ok(Self::from_entries(by_url.into_values().collect()))
            }
        }
    }

    fn from_entries(mut stories: Vec<DirectoryEntry>) -> Self {
        stories.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
        let mut universes = BTreeMap::new();
        for s in &stories {
            *universes.entry(s.marker.universe.clone()).or_insert(0) += 1;
        }
        Self {
            chapters: stories
                .iter()
                .map(|s| u64::from(s.marker.chapter_count))
                .sum(),
            words: stories.iter().map(|s| s.marker.word_count).sum(),
            stories,
            universes,
        }
    }

    /// Story URLs from the markers, in directory-name order.
    pub fn urls(&self) -> Vec<String> {
        self.stories.iter().map(|s| s.marker.url.clone()).collect()
    }

    pub fn render(&self, written_at: &str) -> String {
        let mut html = templates::directory_statistics_intro(
            written_at,
            self.universes.len(),
            self.stories.len(),
            self.words,
            self.chapters,
        );
        for (universe, count) in &self.universes {
            html.push_str(&templates::directory_universe_row(universe, *count));
        }
        html.push_str(templates::DIRECTORY_STORIES_INTRO);
        for s in &self.stories {
            let status = s.marker.status.to_string();
            html.push_str(&templates::directory_story_row(&DirectoryStory {
                numeric_id: &s.numeric_id,
                link: &s.link,
                title: &s.marker.title,
                universe: &s.marker.universe,
                status: &status,
                word_count: s.marker.word_count,
                chapter_count: u64::from(s.marker.chapter_count),
                ratio: s.marker.ratio(),
                summary: &s.marker.summary,
            }));
        }
        html.push_str(templates::DIRECTORY_STATISTICS_END);
        html
    }
}

/// Name of the folder `dir` points at, resolving `.` and trailing separators.
fn folder_name(dir: &Path) -> Result<String, StatsError> {
    if let Some(name) = dir.file_name() {
        return Ok(name.to_string_lossy().into_owned());
    }
    let canonical = dir.canonicalize().map_err(|e| StatsError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    Ok(canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string()))
}

/// Remove previous `stats_*.html` files from `dir`. Returns how many were removed.
fn delete_old_statistics(dir: &Path) -> Result<usize, StatsError> {
    let io_err = |path: &Path, e: std::io::Error| StatsError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut removed = 0;
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if path.is_file() && STATS_FILE_NAME.is_match(&entry.file_name().to_string_lossy()) {
            std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Write `stats_{folder}_{YYYY-MM-DD}.html` into `dir`, replacing older statistics files.
pub fn write_directory_statistics(dir: &Path, now: NaiveDateTime) -> Result<PathBuf, StatsError> {
    write_statistics(&[dir.to_path_buf()], dir, now)
}

/// Write the statistics of `dirs` into `to`, replacing older statistics files there.
/// One directory gives `stats_{folder}_{YYYY-MM-DD}.html`, several `stats_{YYYY-MM-DD}.html`.
pub fn write_statistics(
    dirs: &[PathBuf],
    to: &Path,
    now: NaiveDateTime,
) -> Result<PathBuf, StatsError> {
    let stats = DirectoryStatistics::from_dirs(dirs)?;
    let html = stats.render(&now.format(WRITTEN_AT_FORMAT).to_string());
    if !to.is_dir() {
        return Err(StatsError::NotADirectory {
            path: to.to_path_buf(),
        });
    }
    let removed = delete_old_statistics(to)?;
    let date = now.format("%Y-%m-%d");
    let path = match dirs {
        [dir] => to.join(format!("stats_{}_{}.html", folder_name(dir)?, date)),
        _ => to.join(format!("stats_{}.html", date)),
    };
    std::fs::write(&path, html).map_err(|e| StatsError::Io {
        path: path.clone(),
        source: e,
    })?;
    tracing::info!(
        stories = stats.stories.len(),
        directories = dirs.len(),
        removed,
        path = %path.display(),
        "directory statistics written"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_story;
    use crate::model::Story;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap()
    }

    fn story(id: u64, title: &str, author: &str, universe: &str, chapters: u32) -> Story {
        let mut s = sample_story(chapters);
        s.numeric_id = id;
        s.text_id = title.to_lowercase().replace(' ', "-");
        s.title = title.to_string();
        s.author = author.to_string();
        s.universe = universe.to_string();
        s.url = format!("https://www.fanfiction.net/s/{}/1/", id);
        s.word_count = u64::from(chapters) * 1000;
        s
    }

    #[test]
    fn site_totals_and_row_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut catalog = Catalog::open(dir.path().join("catalog.json"))?;
        catalog.upsert(Entry::from_story(&story(1, "Zeta", "Ann", "Naruto", 2)))?;
        catalog.upsert(Entry::from_story(&story(2, "Alpha", "Ann", "Harry Potter", 3)))?;
        catalog.upsert(Entry::from_story(&story(3, "Mid", "Bob", "Naruto", 1)))?;
        catalog.set_read("https://www.fanfiction.net/s/2/1/", true)?;
        catalog.add_to_series("Saga", "https://www.fanfiction.net/s/1/1/")?;
        catalog.add_to_series("Saga", "https://www.fanfiction.net/s/3/1/")?;

        let stats = site_statistics(&catalog, "fanfiction.net").ok_or("no stats")?;
        assert_eq!(
            stats.totals,
            SiteTotals {
                authors: 2,
                universes: 2,
                chapters: 6,
                words: 6000,
                stories: 3,
                read: 1,
                unread: 2,
                series: 1,
            }
        );
        let alpha = stats.rows.find("Alpha").ok_or("Alpha")?;
        let mid = stats.rows.find("Mid").ok_or("Mid")?;
        let zeta = stats.rows.find("Zeta").ok_or("Zeta")?;
        assert!(alpha < mid && mid < zeta);
        assert!(stats.rows.contains("Saga: n° 2"));
        assert!(stats.rows.contains("<td onclick=\"sortTable(8)\">-</td>"));
        Ok(())
    }

    #[test]
    fn site_without_stories_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let catalog = Catalog::open(dir.path().join("catalog.json"))?;
        assert!(write_site_statistics(dir.path(), &catalog, "fanfiction.net")?.is_none());
        assert!(!dir.path().join("fanfiction.net_statistics.html").exists());
        assert!(!dir.path().join("assets").exists());
        Ok(())
    }

    #[test]
    fn site_statistics_page_and_assets_written() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut catalog = Catalog::open(dir.path().join("catalog.json"))?;
        catalog.upsert(Entry::from_story(&story(5, "Only", "Ann", "Naruto", 12)))?;
        let path = write_site_statistics(dir.path(), &catalog, "fanfiction.net")?
            .ok_or("expected a page")?;
        assert_eq!(path, dir.path().join("fanfiction.net_statistics.html"));
        let html = std::fs::read_to_string(&path)?;
        assert!(html.contains("Chapters: 12 - Words: 12,000 - Stories: 1"));
        assert!(dir.path().join("assets/css/statistics.css").is_file());
        assert!(dir.path().join("assets/js/sorting.js").is_file());
        Ok(())
    }

    fn archive_marker(site_dir: &Path, s: &Story) {
        let story_dir = site_dir.join(s.story_dir_name());
        std::fs::create_dir_all(&story_dir).unwrap();
        Marker::from_story(s)
            .write(&story_dir.join(s.marker_file_name()))
            .unwrap();
    }

    #[test]
    fn directory_statistics_from_markers() -> Result<(), StatsError> {
        let root = tempfile::tempdir().unwrap();
        let site_dir = root.path().join("fanfiction.net");
        archive_marker(&site_dir, &story(9, "Beta", "Ann", "Naruto", 4));
        archive_marker(&site_dir, &story(8, "Alpha", "Bob", "Naruto", 2));
        archive_marker(&site_dir, &story(7, "Gamma", "Cy", "Bleach", 1));
        std::fs::write(site_dir.join(".123"), "not a story dir").unwrap();

        let stats = DirectoryStatistics::collect(&site_dir)?;
        let names: Vec<&str> = stats.stories.iter().map(|s| s.dir_name.as_str()).collect();
        assert_eq!(names, vec!["alpha_8", "beta_9", "gamma_7"]);
        assert_eq!(stats.universes.get("Naruto"), Some(&2));
        assert_eq!(stats.universes.get("Bleach"), Some(&1));
        assert_eq!(stats.chapters, 7);
        assert_eq!(stats.words, 7000);

        let html = stats.render("14:05 - 09 March 2024");
        assert!(html.contains("<li>2 universes,</li>"));
        assert!(html.contains("• Naruto</div>\n<div class='universe_count'>2 stories"));
        assert!(html.contains("<a href='alpha_8/alpha_informations.html'>Alpha</a>"));
        assert!(html.contains("~1,000 w/c"));
        Ok(())
    }

    #[test]
    fn directory_statistics_replace_older_files() -> Result<(), StatsError> {
        let root = tempfile::tempdir().unwrap();
        let site_dir = root.path().join("fanfiction.net");
        archive_marker(&site_dir, &story(1, "One", "Ann", "Naruto", 3));
        std::fs::write(site_dir.join("stats_fanfiction.net_2023-01-02.html"), "old").unwrap();
        std::fs::write(site_dir.join("notes.html"), "keep").unwrap();

        let path = write_directory_statistics(&site_dir, now())?;
        assert_eq!(path, site_dir.join("stats_fanfiction.net_2024-03-09.html"));
        assert!(!site_dir.join("stats_fanfiction.net_2023-01-02.html").exists());
        assert!(site_dir.join("notes.html").exists());
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("Last update: 14:05 - 09 March 2024"));
        Ok(())
    }

    #[test]
    fn statistics_across_directories_count_each_story_once() -> Result<(), StatsError> {
        let root = tempfile::tempdir().unwrap();
        let reading = root.path().join("reading");
        let done = root.path().join("done");
        archive_marker(&reading, &story(1, "One", "Ann", "Naruto", 3));
        archive_marker(&reading, &story(2, "Two", "Ann", "Bleach", 2));
        archive_marker(&done, &story(3, "Three", "Bob", "Naruto", 5));
        let mut moved = story(2, "Two", "Ann", "Bleach", 4);
        moved.word_count = 9000;
        archive_marker(&done, &moved);

        let stats = DirectoryStatistics::from_dirs(&[reading.clone(), done.clone()])?;
        let names: Vec<&str> = stats.stories.iter().map(|s| s.dir_name.as_str()).collect();
        assert_eq!(names, vec!["one_1", "three_3", "two_2"]);
        assert_eq!(stats.chapters, 12);
        assert_eq!(stats.words, 3000 + 5000 + 9000);
        assert_eq!(stats.universes.get("Naruto"), Some(&2));
        assert_eq!(stats.universes.get("Bleach"), Some(&1));
        let html = stats.render("now");
        assert!(html.contains("<a href='https://www.fanfiction.net/s/3/1/'>Three</a>"));

        let target = root.path().join("library");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("stats_2024-01-01.html"), "old").unwrap();
        let path = write_statistics(&[reading, done], &target, now())?;
        assert_eq!(path, target.join("stats_2024-03-09.html"));
        assert!(!target.join("stats_2024-01-01.html").exists());
        Ok(())
    }

    #[test]
    fn single_directory_page_can_go_elsewhere() -> Result<(), StatsError> {
        let root = tempfile::tempdir().unwrap();
        let site_dir = root.path().join("fanfiction.net");
        archive_marker(&site_dir, &story(4, "Four", "Ann", "Naruto", 1));
        let path = write_statistics(&[site_dir.clone()], root.path(), now())?;
        assert_eq!(path, root.path().join("stats_fanfiction.net_2024-03-09.html"));
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("<a href='four_4/four_informations.html'>Four</a>"));
        assert!(matches!(
            write_statistics(&[], root.path(), now()),
            Err(StatsError::NoDirectories)
        ));
        Ok(())
    }

    #[test]
    fn urls_come_from_markers() -> Result<(), StatsError> {
        let root = tempfile::tempdir().unwrap();
        let site_dir = root.path().join("fanfiction.net");
        archive_marker(&site_dir, &story(21, "Beta", "Ann", "Naruto", 1));
        archive_marker(&site_dir, &story(12, "Alpha", "Ann", "Naruto", 1));
        assert_eq!(
            DirectoryStatistics::collect(&site_dir)?.urls(),
            vec![
                "https://www.fanfiction.net/s/12/1/".to_string(),
                "https://www.fanfiction.net/s/21/1/".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn directory_statistics_require_a_directory() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            DirectoryStatistics::collect(&root.path().join("missing")),
            Err(StatsError::NotADirectory { .. })
        ));
    }
}
