//! Canonical data model for an archived story.
//!
//! A [Story] is built fresh from every fetch of the story page and is never
//! mutated across fetches; the numeric id is its durable identity.

use std::fmt;

/// Status token used when the story page carries no "Status: Complete".
pub const IN_PROGRESS: &str = "In Progress";
/// Status token of a finished story.
pub const COMPLETE: &str = "Complete";
/// Last-update sentinel for stories that were never updated.
pub const NEVER_UPDATED: &str = "Never";

/// Publication status of a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Complete,
    InProgress,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Complete => COMPLETE,
            Status::InProgress => IN_PROGRESS,
        }
    }

    /// Recognizes the two status strings (case-insensitive); anything else is
    /// treated as in progress.
    pub fn from_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case(COMPLETE) {
            Status::Complete
        } else {
            Status::InProgress
        }
    }

    /// True when `s` is one of the two recognized status strings.
    pub fn is_recognized(s: &str) -> bool {
        let s = s.trim();
        s.eq_ignore_ascii_case(COMPLETE) || s.eq_ignore_ascii_case(IN_PROGRESS)
    }

    /// CSS class used by the statistics pages.
    pub fn css_class(&self) -> &'static str {
        match self {
            Status::Complete => "complete",
            Status::InProgress => "progress",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fiction work as extracted from its story page.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    /// Human-readable site name, e.g. "fanfiction.net".
    pub site: String,
    /// Directory under the library root holding this site's stories.
    pub site_dir: String,
    /// Site-assigned id. Stable across title edits.
    pub numeric_id: u64,
    /// Slugified, lower-cased title. May change between fetches.
    pub text_id: String,
    pub title: String,
    pub author: String,
    pub author_url: Option<String>,
    /// May contain inline HTML as served by the site.
    pub summary: String,
    pub universe: String,
    pub language: String,
    pub rating: String,
    pub status: Status,
    pub chapter_count: u32,
    pub word_count: u64,
    /// Always exactly `chapter_count` entries.
    pub chapter_titles: Vec<String>,
    pub published: String,
    /// [NEVER_UPDATED] when the story was never updated.
    pub updated: String,
    /// Canonical URL. Never depends on the title.
    pub url: String,
    /// Chapter URL with `{chapter}` in place of the number, for sites whose chapter URLs
    /// cannot be rebuilt from the canonical URL alone.
    pub chapter_url_pattern: Option<String>,
    /// Metadata token string with the status inserted.
    pub tokens: String,
    /// Tokens without rating prefix and counts, used by catalog and statistics.
    pub curated_tokens: String,
}

impl Story {
    /// `{text_id}_{numeric_id}`: the numeric id keeps the directory unique.
    pub fn story_dir_name(&self) -> String {
        format!("{}_{}", self.text_id, self.numeric_id)
    }

    /// Informations file name, always lower-cased.
    pub fn informations_file_name(&self) -> String {
        format!("{}_informations.html", self.text_id.to_lowercase())
    }

    /// Informations path relative to the library root, as stored in the catalog.
    pub fn informations_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.site_dir,
            self.story_dir_name(),
            self.informations_file_name()
        )
        .to_lowercase()
    }

    /// Hidden marker file name, `.{numeric_id}`.
    pub fn marker_file_name(&self) -> String {
        format!(".{}", self.numeric_id)
    }

    /// Title of chapter `n` (1-based). Single-chapter stories use the story title.
    pub fn chapter_title(&self, n: u32) -> &str {
        if self.chapter_count <= 1 {
            return &self.title;
        }
        self.chapter_titles
            .get(n.saturating_sub(1) as usize)
            .map(String::as_str)
            .unwrap_or(&self.title)
    }

    /// Author name, wrapped in a link to the author's page when known.
    pub fn author_html(&self) -> String {
        match &self.author_url {
            Some(url) => format!("<a href='{}'>{}</a>", url, self.author),
            None => self.author.clone(),
        }
    }

    /// Words per chapter, rounded down.
    pub fn words_per_chapter(&self) -> u64 {
        self.word_count / u64::from(self.chapter_count.max(1))
    }
}

/// Number of decimal digits of `n` (at least 1).
pub fn digit_width(n: u32) -> usize {
    n.max(1).to_string().len()
}

/// `{n zero-padded to digit_width(total)}.html`.
pub fn chapter_file_name(n: u32, total: u32) -> String {
    format!("{:0width$}.html", n, width = digit_width(total))
}
