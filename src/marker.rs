//! Hidden per-story marker file: catalog-equivalent fields, one per line.

use crate::model::{Status, Story};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Line order of the marker file.
const FIELDS: [&str; 10] = [
    "chapter_count",
    "status",
    "informations_path",
    "summary",
    "title",
    "universe",
    "url",
    "word_count",
    "author",
    "site",
];

#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("Failed to access marker file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed marker file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Contents of a marker file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub chapter_count: u32,
    pub status: Status,
    /// Informations file relative to the site directory.
    pub informations_path: String,
    pub summary: String,
    pub title: String,
    pub universe: String,
    pub url: String,
    pub word_count: u64,
    pub author: String,
    pub site: String,
}

fn one_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

impl Marker {
    pub fn from_story(story: &Story) -> Self {
        Self {
            chapter_count: story.chapter_count,
            status: story.status,
            informations_path: format!(
                "{}/{}",
                story.story_dir_name(),
                story.informations_file_name()
            )
            .to_lowercase(),
            summary: story.summary.clone(),
            title: story.title.clone(),
            universe: story.universe.clone(),
            url: story.url.clone(),
            word_count: story.word_count,
            author: story.author.clone(),
            site: story.site.clone(),
        }
    }

    pub fn to_text(&self) -> String {
        let lines = [
            self.chapter_count.to_string(),
            self.status.to_string(),
            one_line(&self.informations_path),
            one_line(&self.summary),
            one_line(&self.title),
            one_line(&self.universe),
            one_line(&self.url),
            self.word_count.to_string(),
            one_line(&self.author),
            one_line(&self.site),
        ];
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Parse marker text. Files written before author and site were recorded have
    /// eight lines; those two fields are then empty.
    pub fn parse(path: &Path, text: &str) -> Result<Self, MarkerError> {
        let malformed = |reason: String| MarkerError::Malformed {
            path: path.to_path_buf(),
            reason,
        };
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() < 8 {
            return Err(malformed(format!(
                "expected at least 8 lines ({}), found {}",
                FIELDS[..8].join(", "),
                lines.len()
            )));
        }
        let number = |i: usize| -> Result<u64, MarkerError> {
            lines[i]
                .trim()
                .parse::<u64>()
                .map_err(|_| malformed(format!("{} is not a number: '{}'", FIELDS[i], lines[i])))
        };
        let chapter_count = u32::try_from(number(0)?)
            .map_err(|_| malformed(format!("chapter_count out of range: '{}'", lines[0])))?;
        Ok(Self {
            chapter_count,
            status: Status::from_lenient(lines[1]),
            informations_path: lines[2].to_string(),
            summary: lines[3].to_string(),
            title: lines[4].to_string(),
            universe: lines[5].to_string(),
            url: lines[6].to_string(),
            word_count: number(7)?,
            author: lines.get(8).unwrap_or(&"").to_string(),
            site: lines.get(9).unwrap_or(&"").to_string(),
        })
    }

    pub fn read(path: &Path) -> Result<Self, MarkerError> {
        let text = std::fs::read_to_string(path).map_err(|e| MarkerError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(path, &text)
    }

    pub fn write(&self, path: &Path) -> Result<(), MarkerError> {
        std::fs::write(path, self.to_text()).map_err(|e| MarkerError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Words per chapter, rounded down.
    pub fn ratio(&self) -> u64 {
        self.word_count / u64::from(self.chapter_count.max(1))
    }
}
