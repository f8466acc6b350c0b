//! Persisted catalog of archived stories, keyed by URL and stored as one JSON file.
//!
//! Every mutating call rewrites the file atomically (temp file + rename), so each call is
//! its own committed unit.

use crate::model::{Status, Story, IN_PROGRESS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CATALOG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog file {path} is not valid: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for column {column}: {reason}")]
    InvalidValue { column: Column, reason: String },
}

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub url: String,
    /// Informations file relative to the library root.
    pub path_to_index: String,
    pub site: String,
    pub author: String,
    pub title: String,
    pub chapter_count: u32,
    pub word_count: u64,
    pub status: String,
    pub language: String,
    pub universe: String,
    pub summary: String,
    pub curated_tokens: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub position: u32,
}

impl Entry {
    /// Row for a freshly extracted story, with default user fields.
    pub fn from_story(story: &Story) -> Self {
        Self {
            url: story.url.clone(),
            path_to_index: story.informations_path(),
            site: story.site.clone(),
            author: story.author.clone(),
            title: story.title.clone(),
            chapter_count: story.chapter_count,
            word_count: story.word_count,
            status: story.status.to_string(),
            language: story.language.clone(),
            universe: story.universe.clone(),
            summary: story.summary.clone(),
            curated_tokens: story.curated_tokens.clone(),
            read: false,
            series: String::new(),
            position: 0,
        }
    }

    pub fn get(&self, column: Column) -> Value {
        match column {
            Column::Url => Value::Text(self.url.clone()),
            Column::PathToIndex => Value::Text(self.path_to_index.clone()),
            Column::Site => Value::Text(self.site.clone()),
            Column::Author => Value::Text(self.author.clone()),
            Column::Title => Value::Text(self.title.clone()),
            Column::ChapterCount => Value::Int(u64::from(self.chapter_count)),
            Column::WordCount => Value::Int(self.word_count),
            Column::Status => Value::Text(self.status.clone()),
            Column::Language => Value::Text(self.language.clone()),
            Column::Universe => Value::Text(self.universe.clone()),
            Column::Summary => Value::Text(self.summary.clone()),
            Column::CuratedTokens => Value::Text(self.curated_tokens.clone()),
            Column::Read => Value::Bool(self.read),
            Column::Series => Value::Text(self.series.clone()),
            Column::Position => Value::Int(u64::from(self.position)),
        }
    }

    fn set(&mut self, column: Column, value: Value) -> Result<(), CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidValue {
            column,
            reason: reason.to_string(),
        };
        let small = |n: u64| u32::try_from(n).map_err(|_| invalid("number out of range"));
        match (column, value) {
            (Column::Url, _) => return Err(invalid("the URL is the key and cannot be updated")),
            (Column::PathToIndex, Value::Text(s)) => self.path_to_index = s,
            (Column::Site, Value::Text(s)) => self.site = s,
            (Column::Author, Value::Text(s)) => self.author = s,
            (Column::Title, Value::Text(s)) => self.title = s,
            (Column::ChapterCount, Value::Int(n)) => self.chapter_count = small(n)?,
            (Column::WordCount, Value::Int(n)) => self.word_count = n,
            (Column::Status, Value::Text(s)) => self.status = coerce_status(&s),
            (Column::Language, Value::Text(s)) => self.language = s,
            (Column::Universe, Value::Text(s)) => self.universe = s,
            (Column::Summary, Value::Text(s)) => self.summary = s,
            (Column::CuratedTokens, Value::Text(s)) => self.curated_tokens = s,
            (Column::Read, Value::Bool(b)) => self.read = b,
            (Column::Series, Value::Text(s)) => self.series = s,
            (Column::Position, Value::Int(n)) => self.position = small(n)?,
            (_, other) => {
                return Err(invalid(&format!(
                    "expected {}, got {}",
                    column.kind(),
                    other.kind()
                )))
            }
        }
        Ok(())
    }
}

/// Status strings other than the two recognized ones become "In Progress".
fn coerce_status(s: &str) -> String {
    if Status::is_recognized(s) {
        Status::from_lenient(s).to_string()
    } else {
        IN_PROGRESS.to_string()
    }
}

/// Catalog columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Url,
    PathToIndex,
    Site,
    Author,
    Title,
    ChapterCount,
    WordCount,
    Status,
    Language,
    Universe,
    Summary,
    CuratedTokens,
    Read,
    Series,
    Position,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Url => "url",
            Column::PathToIndex => "path_to_index",
            Column::Site => "site",
            Column::Author => "author",
            Column::Title => "title",
            Column::ChapterCount => "chapter_count",
            Column::WordCount => "word_count",
            Column::Status => "status",
            Column::Language => "language",
            Column::Universe => "universe",
            Column::Summary => "summary",
            Column::CuratedTokens => "curated_tokens",
            Column::Read => "read",
            Column::Series => "series",
            Column::Position => "position",
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Column::ChapterCount | Column::WordCount | Column::Position => "integer",
            Column::Read => "boolean",
            _ => "text",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Text(String),
    Int(u64),
    Bool(bool),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Int(_) => "integer",
            Value::Bool(_) => "boolean",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Equality predicate on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: Column,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: Column, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }

    fn matches(&self, entry: &Entry) -> bool {
        entry.get(self.column) == self.value
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    stories: Vec<Entry>,
}

/// The catalog, loaded in memory and written back on every change.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    entries: Vec<Entry>,
}

impl Catalog {
    /// Load the catalog at `path`; a missing file is an empty catalog.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => {
                let file: CatalogFile =
                    serde_json::from_slice(&bytes).map_err(|e| CatalogError::Json {
                        path: path.clone(),
                        source: e,
                    })?;
                file.stories
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(CatalogError::Io { path, source: e }),
        };
        tracing::debug!(path = %path.display(), stories = entries.len(), "catalog opened");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&self) -> Result<(), CatalogError> {
        let io_err = |path: &Path, e: std::io::Error| CatalogError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let file = CatalogFile {
            version: CATALOG_VERSION,
            stories: self.entries.clone(),
        };
        let data = serde_json::to_vec_pretty(&file).map_err(|e| CatalogError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        let tmp_path = self
            .path
            .with_extension(format!("tmp.{}", std::process::id()));
        std::fs::write(&tmp_path, &data).map_err(|e| io_err(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    fn position_of(&self, url: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.url == url)
    }

    /// Insert or replace the row for `entry.url`, carrying forward read/series/position.
    pub fn upsert(&mut self, mut entry: Entry) -> Result<(), CatalogError> {
        entry.status = coerce_status(&entry.status);
        match self.position_of(&entry.url) {
            Some(i) => {
                let old = self.entries.remove(i);
                entry.read = old.read;
                entry.series = old.series;
                entry.position = old.position;
                tracing::debug!(url = %entry.url, "catalog entry replaced");
            }
            None => {
                entry.read = false;
                entry.series = String::new();
                entry.position = 0;
                tracing::debug!(url = %entry.url, "catalog entry inserted");
            }
        }
        self.entries.push(entry);
        self.commit()
    }

    /// Remove the row for `url`. Returns whether it existed.
    pub fn delete(&mut self, url: &str) -> Result<bool, CatalogError> {
        match self.position_of(url) {
            Some(i) => {
                self.entries.remove(i);
                self.commit()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get(&self, column: Column, url: &str) -> Option<Value> {
        self.entry(url).map(|e| e.get(column))
    }

    /// Set one column of the row for `url`. Returns whether the row exists.
    pub fn update_field(
        &mut self,
        column: Column,
        value: impl Into<Value>,
        url: &str,
    ) -> Result<bool, CatalogError> {
        let Some(i) = self.position_of(url) else {
            return Ok(false);
        };
        self.entries[i].set(column, value.into())?;
        self.commit()?;
        Ok(true)
    }

    /// Values of `column` for every row matching `filter`, in catalog order.
    /// `distinct` drops repeated values and sorts the rest.
    pub fn query(&self, column: Column, distinct: bool, filter: Option<&Filter>) -> Vec<Value> {
        let values = self
            .entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(e)))
            .map(|e| e.get(column));
        if distinct {
            values.collect::<BTreeSet<_>>().into_iter().collect()
        } else {
            values.collect()
        }
    }

    /// Rows of `site`, sorted by title.
    pub fn stories_for_site(&self, site: &str) -> Vec<Entry> {
        let mut rows: Vec<Entry> = self
            .entries
            .iter()
            .filter(|e| e.site == site)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.url.cmp(&b.url)));
        rows
    }

    /// URLs of the members of `series`, unordered.
    pub fn urls_for_series(&self, series: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.series == series)
            .map(|e| e.url.clone())
            .collect()
    }

    /// Append `url` to `series`. No-op when already a member; returns whether the row exists.
    pub fn add_to_series(&mut self, series: &str, url: &str) -> Result<bool, CatalogError> {
        let Some(i) = self.position_of(url) else {
            return Ok(false);
        };
        if self.entries[i].series == series {
            return Ok(true);
        }
        let position = if series.is_empty() {
            0
        } else {
            self.urls_for_series(series).len() as u32 + 1
        };
        self.entries[i].series = series.to_string();
        self.entries[i].position = position;
        self.commit()?;
        Ok(true)
    }

    /// Dissolve `series`: members get an empty series and position 0. Returns how many.
    pub fn delete_series(&mut self, series: &str) -> Result<usize, CatalogError> {
        let mut changed = 0;
        for e in self.entries.iter_mut().filter(|e| e.series == series) {
            e.series.clear();
            e.position = 0;
            changed += 1;
        }
        if changed > 0 {
            self.commit()?;
        }
        Ok(changed)
    }

    pub fn set_read(&mut self, url: &str, read: bool) -> Result<bool, CatalogError> {
        self.update_field(Column::Read, read, url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.position_of(url).is_some()
    }

    pub fn entry(&self, url: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.url == url)
    }

    pub fn all(&self) -> &[Entry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_story;

    fn open_temp() -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.json")).unwrap();
        (dir, catalog)
    }

    fn entry(url: &str, title: &str) -> Entry {
        let mut e = Entry::from_story(&sample_story(3));
        e.url = url.to_string();
        e.title = title.to_string();
        e
    }

    #[test]
    fn missing_file_is_empty_catalog() {
        let (_dir, catalog) = open_temp();
        assert!(catalog.all().is_empty());
        assert!(catalog.query(Column::Url, false, None).is_empty());
    }

    #[test]
    fn upsert_twice_is_idempotent() -> Result<(), CatalogError> {
        let (_dir, mut catalog) = open_temp();
        catalog.upsert(entry("u1", "One"))?;
        catalog.set_read("u1", true)?;
        catalog.add_to_series("S", "u1")?;
        catalog.upsert(entry("u1", "One"))?;
        catalog.upsert(entry("u1", "One"))?;
        assert_eq!(catalog.query(Column::Url, false, None).len(), 1);
        let row = catalog.entry("u1").unwrap();
        assert!(row.read);
        assert_eq!(row.series, "S");
        assert_eq!(row.position, 1);
        Ok(())
    }

    #[test]
    fn upsert_preserves_user_fields_across_title_change() -> Result<(), CatalogError> {
        let (dir, mut catalog) = open_temp();
        let mut first = entry("X", "Old Title");
        first.read = true;
        catalog.upsert(first)?;
        // Incoming user fields are ignored on insert.
        assert!(!catalog.entry("X").unwrap().read);
        catalog.set_read("X", true)?;
        catalog.update_field(Column::Series, "S", "X")?;
        catalog.update_field(Column::Position, 2u64, "X")?;
        catalog.upsert(entry("X", "New Title"))?;

        let reopened = Catalog::open(dir.path().join("catalog.json"))?;
        let row = reopened.entry("X").unwrap();
        assert_eq!(row.title, "New Title");
        assert!(row.read);
        assert_eq!(row.series, "S");
        assert_eq!(row.position, 2);
        Ok(())
    }

    #[test]
    fn unknown_status_is_coerced() -> Result<(), CatalogError> {
        let (_dir, mut catalog) = open_temp();
        let mut e = entry("u", "T");
        e.status = "Abandoned".to_string();
        catalog.upsert(e)?;
        assert_eq!(catalog.get(Column::Status, "u"), Some(Value::from("In Progress")));
        let mut e = entry("v", "T");
        e.status = "complete".to_string();
        catalog.upsert(e)?;
        assert_eq!(catalog.get(Column::Status, "v"), Some(Value::from("Complete")));
        Ok(())
    }

    #[test]
    fn delete_absent_is_not_an_error() -> Result<(), CatalogError> {
        let (_dir, mut catalog) = open_temp();
        assert!(!catalog.delete("nope")?);
        catalog.upsert(entry("u", "T"))?;
        assert!(catalog.delete("u")?);
        assert!(!catalog.contains("u"));
        assert_eq!(catalog.get(Column::Title, "u"), None);
        Ok(())
    }

    #[test]
    fn update_field_type_checks() -> Result<(), CatalogError> {
        let (_dir, mut catalog) = open_temp();
        catalog.upsert(entry("u", "T"))?;
        assert!(matches!(
            catalog.update_field(Column::WordCount, "many", "u"),
            Err(CatalogError::InvalidValue {
                column: Column::WordCount,
                ..
            })
        ));
        assert!(catalog.update_field(Column::Url, "other", "u").is_err());
        assert!(!catalog.update_field(Column::Read, true, "missing")?);
        Ok(())
    }

    #[test]
    fn query_with_filter_and_distinct() -> Result<(), CatalogError> {
        let (_dir, mut catalog) = open_temp();
        let mut a = entry("a", "A");
        a.author = "Zed".to_string();
        let mut b = entry("b", "B");
        b.author = "Amy".to_string();
        let mut c = entry("c", "C");
        c.author = "Zed".to_string();
        c.site = "elsewhere".to_string();
        for e in [a, b, c] {
            catalog.upsert(e)?;
        }
        assert_eq!(
            catalog.query(Column::Author, true, None),
            vec![Value::from("Amy"), Value::from("Zed")]
        );
        let site = Filter::eq(Column::Site, "fanfiction.net");
        assert_eq!(catalog.query(Column::Author, false, Some(&site)).len(), 2);
        let none = Filter::eq(Column::Author, "Nobody");
        assert!(catalog.query(Column::Url, false, Some(&none)).is_empty());
        Ok(())
    }

    #[test]
    fn stories_for_site_sorted_by_title() -> Result<(), CatalogError> {
        let (_dir, mut catalog) = open_temp();
        catalog.upsert(entry("1", "Charlie"))?;
        catalog.upsert(entry("2", "Alpha"))?;
        catalog.upsert(entry("3", "Bravo"))?;
        let titles: Vec<String> = catalog
            .stories_for_site("fanfiction.net")
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Alpha", "Bravo", "Charlie"]);
        assert!(catalog.stories_for_site("other").is_empty());
        Ok(())
    }

    #[test]
    fn series_membership_and_dissolution() -> Result<(), CatalogError> {
        let (_dir, mut catalog) = open_temp();
        for url in ["a", "b", "c"] {
            catalog.upsert(entry(url, url))?;
        }
        catalog.add_to_series("Saga", "a")?;
        catalog.add_to_series("Saga", "b")?;
        catalog.add_to_series("Saga", "b")?;
        assert_eq!(catalog.entry("b").unwrap().position, 2);
        let mut members = catalog.urls_for_series("Saga");
        members.sort();
        assert_eq!(members, vec!["a", "b"]);

        catalog.add_to_series("", "c")?;
        assert_eq!(catalog.entry("c").unwrap().position, 0);

        assert_eq!(catalog.delete_series("Saga")?, 2);
        assert!(catalog.urls_for_series("Saga").is_empty());
        assert_eq!(catalog.entry("a").unwrap().position, 0);
        Ok(())
    }

    #[test]
    fn corrupt_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Catalog::open(&path),
            Err(CatalogError::Json { .. })
        ));
    }
}
