//! Applies download and update plans to a story directory: assets, informations page,
//! marker file and chapter files.

use crate::marker::{Marker, MarkerError};
use crate::model::{chapter_file_name, Story};
use crate::planner::{self, Plan};
use crate::render::{self, WRITTEN_AT_FORMAT};
use crate::scraper::{Fetch, ScraperError, SiteAdapter};
use crate::templates::{ASSETS, ASSETS_DIR};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Marker(#[from] MarkerError),

    #[error("Story directory does not exist: {path}. Download the story first.")]
    MissingStoryDir { path: PathBuf },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> WriteError + '_ {
    move |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Result of processing one story, with its process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First download (or the story directory held no chapters).
    Downloaded { chapters: u32 },
    /// New chapters were fetched, or the story was rewritten after a padding change.
    Updated { chapters: u32 },
    /// Nothing to fetch; informations and marker were refreshed.
    UpToDate,
    /// Only informations and marker were rewritten, on request.
    InformationsRefreshed,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Downloaded { .. } | Outcome::InformationsRefreshed => 0,
            Outcome::Updated { .. } => 20,
            Outcome::UpToDate => 21,
        }
    }
}

/// Progress callback: `(chapter, total)` after each chapter is written.
pub type Progress<'a> = &'a dyn Fn(u32, u32);

/// Writes stories under a library root, fetching chapters through `fetcher`.
pub struct StoryWriter<'a> {
    library: &'a Path,
    adapter: &'a dyn SiteAdapter,
    fetcher: &'a mut dyn Fetch,
    progress: Option<Progress<'a>>,
    written_at: String,
}

impl<'a> StoryWriter<'a> {
    pub fn new(library: &'a Path, adapter: &'a dyn SiteAdapter, fetcher: &'a mut dyn Fetch) -> Self {
        Self {
            library,
            adapter,
            fetcher,
            progress: None,
            written_at: chrono::Local::now().format(WRITTEN_AT_FORMAT).to_string(),
        }
    }

    pub fn with_progress(mut self, progress: Option<Progress<'a>>) -> Self {
        self.progress = progress;
        self
    }

    /// Fix the timestamp printed on informations pages.
    pub fn with_written_at(mut self, written_at: impl Into<String>) -> Self {
        self.written_at = written_at.into();
        self
    }

    /// `{library}/{site_dir}/{text_id}_{numeric_id}`.
    pub fn story_dir(&self, story: &Story) -> PathBuf {
        story_dir(self.library, story)
    }

    /// Wipe any previous copy and write the whole story.
    pub fn download(&mut self, story: &Story) -> Result<Outcome, WriteError> {
        let site_dir = self.library.join(&story.site_dir);
        std::fs::create_dir_all(&site_dir).map_err(io_err(&site_dir))?;
        self.adopt_renamed_dir(story)?;
        let dir = self.story_dir(story);
        if dir.exists() {
            tracing::debug!(dir = %dir.display(), "removing previous story directory");
            std::fs::remove_dir_all(&dir).map_err(io_err(&dir))?;
        }
        std::fs::create_dir(&dir).map_err(io_err(&dir))?;
        tracing::info!(title = %story.title, chapters = story.chapter_count, "downloading story");

        self.write_assets()?;
        self.write_informations(story)?;
        self.write_chapters(story, 1, story.chapter_count)?;
        Ok(Outcome::Downloaded {
            chapters: story.chapter_count,
        })
    }

    /// Bring an existing copy up to date, or download it when there is none.
    pub fn update(&mut self, story: &Story) -> Result<Outcome, WriteError> {
        self.adopt_renamed_dir(story)?;
        let dir = self.story_dir(story);
        let existing =
            planner::inspect(&dir, &story.marker_file_name()).map_err(io_err(&dir))?;
        let had_chapters = existing.is_some_and(|e| e.chapter_files > 0);
        let plan = planner::decide(existing, story.chapter_count);
        tracing::info!(title = %story.title, ?plan, "updating story");

        match plan {
            Plan::FullDownload => {
                let outcome = self.download(story)?;
                if had_chapters {
                    Ok(Outcome::Updated {
                        chapters: story.chapter_count,
                    })
                } else {
                    Ok(outcome)
                }
            }
            Plan::NoOp => {
                self.write_assets()?;
                self.write_informations(story)?;
                Ok(Outcome::UpToDate)
            }
            Plan::PartialDownload { from, to } => {
                self.write_assets()?;
                self.write_informations(story)?;
                self.patch_navigation(story, &dir, from - 1)?;
                self.write_chapters(story, from, to)?;
                Ok(Outcome::Updated {
                    chapters: to - from + 1,
                })
            }
        }
    }

    /// Move a copy saved under an older text id (`{old_text_id}_{numeric_id}` holding the
    /// marker) to the current story directory name and drop its old informations page.
    /// Nothing moves when the current directory already exists.
    pub fn adopt_renamed_dir(&self, story: &Story) -> Result<Option<PathBuf>, WriteError> {
        let dir = self.story_dir(story);
        let site_dir = self.library.join(&story.site_dir);
        if dir.exists() || !site_dir.is_dir() {
            return Ok(None);
        }
        let suffix = format!("_{}", story.numeric_id);
        let entries = std::fs::read_dir(&site_dir).map_err(io_err(&site_dir))?;
        for entry in entries {
            let entry = entry.map_err(io_err(&site_dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(old_text_id) = name.strip_suffix(&suffix) else {
                continue;
            };
            let old = entry.path();
            if !old.join(story.marker_file_name()).is_file() {
                continue;
            }
            std::fs::rename(&old, &dir).map_err(io_err(&old))?;
            let old_info = format!("{}_informations.html", old_text_id.to_lowercase());
            let new_info = story.informations_file_name();
            if old_info != new_info {
                relink_chapters(&dir, &old_info, &new_info)?;
                let stale = dir.join(&old_info);
                if stale.is_file() {
                    std::fs::remove_file(&stale).map_err(io_err(&stale))?;
                }
            }
            tracing::info!(from = %old.display(), to = %dir.display(), "story directory renamed");
            return Ok(Some(old));
        }
        Ok(None)
    }

    /// Rewrite the informations page and the marker file of an existing story directory.
    pub fn write_informations(&self, story: &Story) -> Result<(), WriteError> {
        let dir = self.story_dir(story);
        if !dir.is_dir() {
            return Err(WriteError::MissingStoryDir { path: dir });
        }
        let path = dir.join(story.informations_file_name());
        let html = render::render_informations(story, &self.written_at);
        std::fs::write(&path, html).map_err(io_err(&path))?;
        Marker::from_story(story).write(&dir.join(story.marker_file_name()))?;
        tracing::debug!(path = %path.display(), "informations written");
        Ok(())
    }

    /// Write the shared CSS and JS assets under the library root.
    pub fn write_assets(&self) -> Result<(), WriteError> {
        write_assets(self.library)
    }

    fn write_chapters(&mut self, story: &Story, from: u32, to: u32) -> Result<(), WriteError> {
        let dir = self.story_dir(story);
        for n in from..=to {
            let body = self
                .adapter
                .fetch_chapter(&mut *self.fetcher, story, n)?;
            let path = dir.join(chapter_file_name(n, story.chapter_count));
            std::fs::write(&path, render::render_chapter(story, n, &body))
                .map_err(io_err(&path))?;
            tracing::debug!(chapter = n, total = story.chapter_count, "chapter written");
            if let Some(progress) = self.progress {
                progress(n, story.chapter_count);
            }
        }
        Ok(())
    }

    /// Patch chapters `1..=last_old` for the new total. Missing files are skipped.
    fn patch_navigation(&self, story: &Story, dir: &Path, last_old: u32) -> Result<(), WriteError> {
        for n in 1..=last_old {
            let path = dir.join(chapter_file_name(n, story.chapter_count));
            let html = match std::fs::read_to_string(&path) {
                Ok(html) => html,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), "chapter file missing, not patched");
                    continue;
                }
                Err(e) => return Err(io_err(&path)(e)),
            };
            let patched = render::patch_navigation(&html, n, story.chapter_count);
            if patched != html {
                std::fs::write(&path, patched).map_err(io_err(&path))?;
            }
        }
        Ok(())
    }
}

/// Point every chapter page's index link at the renamed informations page.
fn relink_chapters(dir: &Path, old_info: &str, new_info: &str) -> Result<(), WriteError> {
    for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        let is_chapter = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()));
        if !is_chapter || path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        let html = std::fs::read_to_string(&path).map_err(io_err(&path))?;
        let relinked = render::relink_index(&html, old_info, new_info);
        if relinked != html {
            std::fs::write(&path, relinked).map_err(io_err(&path))?;
        }
    }
    Ok(())
}

/// `{library}/{site_dir}/{text_id}_{numeric_id}`.
pub fn story_dir(library: &Path, story: &Story) -> PathBuf {
    library.join(&story.site_dir).join(story.story_dir_name())
}

pub fn write_assets(library: &Path) -> Result<(), WriteError> {
    let base = library.join(ASSETS_DIR);
    for (relative, content) in ASSETS {
        let path = base.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        std::fs::write(&path, content).map_err(io_err(&path))?;
    }
    Ok(())
}

/// Remove a story directory. Returns whether it existed.
pub fn delete_story_dir(path: &Path) -> Result<bool, WriteError> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(path).map_err(io_err(path))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_story;
    use crate::scraper::fanfiction::tests::chapter_page;
    use crate::scraper::FanFictionNet;
    use std::cell::RefCell;
    use std::fs;

    /// Serves a chapter page for any chapter URL and records what was fetched.
    #[derive(Default)]
    struct ChapterServer {
        fetched: Vec<u32>,
        fail_on: Option<u32>,
    }

    impl Fetch for ChapterServer {
        fn fetch(&mut self, url: &str) -> Result<String, ScraperError> {
            let n: u32 = url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap();
            if self.fail_on == Some(n) {
                return Err(ScraperError::HttpStatus {
                    status: 503,
                    url: url.to_string(),
                });
            }
            self.fetched.push(n);
            Ok(chapter_page(&format!("<p>Chapter {} text.</p>", n), true))
        }
    }

    fn chapter_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".html") && !n.contains("informations"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn download_writes_layout() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let mut server = ChapterServer::default();
        let story = sample_story(3);
        let outcome = StoryWriter::new(library.path(), &adapter, &mut server)
            .with_written_at("12:00 - 01 March 2024")
            .download(&story)?;
        assert_eq!(outcome, Outcome::Downloaded { chapters: 3 });
        assert_eq!(outcome.exit_code(), 0);

        let dir = library.path().join("fanfiction.net/a-quiet-evening_424242");
        assert_eq!(chapter_files(&dir), vec!["1.html", "2.html", "3.html"]);
        let info = fs::read_to_string(dir.join("a-quiet-evening_informations.html")).unwrap();
        assert!(info.contains("12:00 - 01 March 2024"));
        assert!(dir.join(".424242").is_file());
        assert!(library.path().join("assets/css/chapter.css").is_file());
        assert!(library.path().join("assets/js/sorting.js").is_file());
        let two = fs::read_to_string(dir.join("2.html")).unwrap();
        assert!(two.contains("<p>Chapter 2 text.</p>"));
        assert_eq!(server.fetched, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn download_replaces_previous_copy() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let story = sample_story(2);
        let dir = story_dir(library.path(), &story);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale.txt"), "x").unwrap();
        let mut server = ChapterServer::default();
        StoryWriter::new(library.path(), &adapter, &mut server).download(&story)?;
        assert!(!dir.join("stale.txt").exists());
        Ok(())
    }

    #[test]
    fn update_of_unknown_story_downloads() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let mut server = ChapterServer::default();
        let outcome =
            StoryWriter::new(library.path(), &adapter, &mut server).update(&sample_story(2))?;
        assert_eq!(outcome, Outcome::Downloaded { chapters: 2 });
        Ok(())
    }

    #[test]
    fn partial_update_fetches_only_new_chapters_and_patches_links() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let mut server = ChapterServer::default();
        StoryWriter::new(library.path(), &adapter, &mut server).download(&sample_story(3))?;

        let mut server = ChapterServer::default();
        let progress_calls = RefCell::new(Vec::new());
        let progress = |n: u32, total: u32| progress_calls.borrow_mut().push((n, total));
        let outcome = StoryWriter::new(library.path(), &adapter, &mut server)
            .with_progress(Some(&progress))
            .update(&sample_story(5))?;
        assert_eq!(outcome, Outcome::Updated { chapters: 2 });
        assert_eq!(outcome.exit_code(), 20);
        assert_eq!(server.fetched, vec![4, 5]);
        assert_eq!(progress_calls.into_inner(), vec![(4, 5), (5, 5)]);

        let dir = library.path().join("fanfiction.net/a-quiet-evening_424242");
        for n in 1..=5 {
            let html = fs::read_to_string(dir.join(format!("{}.html", n))).unwrap();
            assert_eq!(render::navigation_total(&html), Some(5), "chapter {}", n);
        }
        let three = fs::read_to_string(dir.join("3.html")).unwrap();
        assert!(three.contains("<a class='next' href='4.html'>Next (4/5)</a>"));
        assert_eq!(Marker::read(&dir.join(".424242"))?.chapter_count, 5);
        Ok(())
    }

    #[test]
    fn width_change_rewrites_everything() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let mut server = ChapterServer::default();
        StoryWriter::new(library.path(), &adapter, &mut server).download(&sample_story(9))?;

        let mut server = ChapterServer::default();
        let outcome =
            StoryWriter::new(library.path(), &adapter, &mut server).update(&sample_story(10))?;
        assert_eq!(outcome, Outcome::Updated { chapters: 10 });
        assert_eq!(server.fetched, (1..=10).collect::<Vec<_>>());
        let dir = library.path().join("fanfiction.net/a-quiet-evening_424242");
        let files = chapter_files(&dir);
        assert_eq!(files.len(), 10);
        assert_eq!(files[0], "01.html");
        Ok(())
    }

    #[test]
    fn up_to_date_rewrites_informations_only() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let mut server = ChapterServer::default();
        StoryWriter::new(library.path(), &adapter, &mut server).download(&sample_story(5))?;

        let mut fresh = sample_story(5);
        fresh.word_count = 9999;
        let mut server = ChapterServer::default();
        let outcome = StoryWriter::new(library.path(), &adapter, &mut server)
            .with_written_at("later")
            .update(&fresh)?;
        assert_eq!(outcome, Outcome::UpToDate);
        assert_eq!(outcome.exit_code(), 21);
        assert!(server.fetched.is_empty());
        let dir = story_dir(library.path(), &fresh);
        let info = fs::read_to_string(dir.join(fresh.informations_file_name())).unwrap();
        assert!(info.contains("later"));
        assert_eq!(Marker::read(&dir.join(".424242"))?.word_count, 9999);
        Ok(())
    }

    #[test]
    fn failed_chapter_fetch_propagates_and_update_resumes() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let story = sample_story(4);
        let mut server = ChapterServer {
            fail_on: Some(3),
            ..Default::default()
        };
        let err = StoryWriter::new(library.path(), &adapter, &mut server)
            .download(&story)
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::Scraper(ScraperError::HttpStatus { status: 503, .. })
        ));

        let mut server = ChapterServer::default();
        let outcome = StoryWriter::new(library.path(), &adapter, &mut server).update(&story)?;
        assert_eq!(outcome, Outcome::Updated { chapters: 2 });
        assert_eq!(server.fetched, vec![3, 4]);
        Ok(())
    }

    #[test]
    fn title_change_renames_directory_in_place() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let mut server = ChapterServer::default();
        StoryWriter::new(library.path(), &adapter, &mut server).download(&sample_story(3))?;

        let mut renamed = sample_story(3);
        renamed.text_id = "a-loud-evening".to_string();
        let mut server = ChapterServer::default();
        let outcome = StoryWriter::new(library.path(), &adapter, &mut server).update(&renamed)?;
        assert_eq!(outcome, Outcome::UpToDate);
        assert!(server.fetched.is_empty());

        let site = library.path().join("fanfiction.net");
        let dirs: Vec<String> = fs::read_dir(&site)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(dirs, vec!["a-loud-evening_424242"]);
        let dir = site.join("a-loud-evening_424242");
        assert_eq!(chapter_files(&dir), vec!["1.html", "2.html", "3.html"]);
        assert!(dir.join("a-loud-evening_informations.html").is_file());
        assert!(!dir.join("a-quiet-evening_informations.html").exists());
        let one = fs::read_to_string(dir.join("1.html")).unwrap();
        assert!(one.contains("href='a-loud-evening_informations.html'"));
        Ok(())
    }

    #[test]
    fn directory_without_marker_is_not_adopted() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let other = library.path().join("fanfiction.net/unrelated_424242");
        fs::create_dir_all(&other).unwrap();
        let mut server = ChapterServer::default();
        let writer = StoryWriter::new(library.path(), &adapter, &mut server);
        assert_eq!(writer.adopt_renamed_dir(&sample_story(2))?, None);
        assert!(other.is_dir());
        Ok(())
    }

    #[test]
    fn write_informations_requires_story_dir() {
        let library = tempfile::tempdir().unwrap();
        let adapter = FanFictionNet::new();
        let mut server = ChapterServer::default();
        let writer = StoryWriter::new(library.path(), &adapter, &mut server);
        assert!(matches!(
            writer.write_informations(&sample_story(1)),
            Err(WriteError::MissingStoryDir { .. })
        ));
    }

    #[test]
    fn delete_story_dir_reports_existence() -> Result<(), WriteError> {
        let library = tempfile::tempdir().unwrap();
        let dir = library.path().join("fanfiction.net/x_1");
        fs::create_dir_all(&dir).unwrap();
        assert!(delete_story_dir(&dir)?);
        assert!(!delete_story_dir(&dir)?);
        Ok(())
    }
}
