//! Incremental update planning: compare chapter files already on disk with the freshly
//! fetched chapter count.

use crate::marker::Marker;
use crate::model::{digit_width, Story};
use std::io;
use std::path::Path;

/// What an update has to do for one story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Wipe the story directory and write every chapter.
    FullDownload,
    /// Chapters on disk match; only informations and marker are rewritten.
    NoOp,
    /// Fetch chapters `from..=to` and patch the navigation of earlier ones.
    PartialDownload { from: u32, to: u32 },
}

/// What is on disk for a story directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Existing {
    /// Raw count of `\d+.html` files directly inside the directory.
    pub chapter_files: u32,
    /// Chapter total recorded in a readable marker file.
    pub recorded_total: Option<u32>,
}

impl Existing {
    /// Padding width the existing files were written with.
    pub fn recorded_width(&self) -> usize {
        digit_width(self.recorded_total.unwrap_or(self.chapter_files))
    }
}

fn is_chapter_file(name: &str) -> bool {
    name.strip_suffix(".html")
        .is_some_and(|stem| !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()))
}

/// Inspect `dir`. A missing directory is reported as `None`.
pub fn inspect(dir: &Path, marker_name: &str) -> io::Result<Option<Existing>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut chapter_files = 0u32;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_chapter_file(&entry.file_name().to_string_lossy()) {
            chapter_files += 1;
        }
    }
    let recorded_total = match Marker::read(&dir.join(marker_name)) {
        Ok(marker) => Some(marker.chapter_count),
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "no usable marker file");
            None
        }
    };
    Ok(Some(Existing {
        chapter_files,
        recorded_total,
    }))
}

/// Decide from what is on disk and the fresh chapter count.
pub fn decide(existing: Option<Existing>, fresh_count: u32) -> Plan {
    let Some(existing) = existing else {
        return Plan::FullDownload;
    };
    let count = existing.chapter_files;
    if count == 0 || existing.recorded_width() != digit_width(fresh_count) || count > fresh_count
    {
        Plan::FullDownload
    } else if count == fresh_count {
        Plan::NoOp
    } else {
        Plan::PartialDownload {
            from: count + 1,
            to: fresh_count,
        }
    }
}

/// Plan the update of `fresh` whose directory is `existing_dir`.
pub fn plan_update(existing_dir: &Path, fresh: &Story) -> io::Result<Plan> {
    let existing = inspect(existing_dir, &fresh.marker_file_name())?;
    let plan = decide(existing, fresh.chapter_count);
    tracing::debug!(
        dir = %existing_dir.display(),
        ?existing,
        fresh = fresh.chapter_count,
        ?plan,
        "planned update"
    );
    Ok(plan)
}
