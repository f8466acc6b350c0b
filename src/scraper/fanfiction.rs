//! fanfiction.net adapter. Story metadata comes from fixed regular expressions over the
//! first chapter page; chapter text is cut out between fixed markers.

use crate::model::{Status, Story, NEVER_UPDATED};
use crate::scraper::error::ScraperError;
use crate::scraper::fields::{
    clean_text_id, parse_grouped_number, story_title_case, strip_tags, title_case, FieldMap,
    FieldSpec,
};
use crate::scraper::SiteAdapter;
use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;

pub const SITE_NAME: &str = "fanfiction.net";
const BASE_URL: &str = "https://www.fanfiction.net";
const HOSTS: [&str; 3] = ["www.fanfiction.net", "fanfiction.net", "m.fanfiction.net"];

/// Fields read from the raw story page.
const PAGE_FIELDS: [FieldSpec; 7] = [
    FieldSpec::required("author", r"By:</span> <a .*?>(.*?)</a>"),
    FieldSpec::optional("author_id", r"/u/(\d+)/"),
    FieldSpec::optional("universe", r"<title>.*, an? (.*) fanfic \| FanFiction</title>"),
    FieldSpec::required(
        "text_id",
        r#"href="//www\.fanfiction\.net/s/\d+/\d+/([^"]*)">"#,
    ),
    FieldSpec::required("title", r"<b class='xcontrast_txt'>(.*?)</b>"),
    FieldSpec::required(
        "summary",
        r"<div style='margin-top:2px' class='xcontrast_txt'>(.*?)</div>",
    ),
    FieldSpec::required("tokens", r"<span class='xgray xcontrast_txt'>(.*)</span>"),
];

/// Chapter titles from the chapter select box. Every page carries the box twice.
const CHAPTER_TITLES: [FieldSpec; 1] = [FieldSpec::all(
    "chapter_titles",
    r"option value=\d+ .*?>(.*?)<",
)];

/// Fields read from the tag-stripped token block.
const TOKEN_FIELDS: [FieldSpec; 5] = [
    FieldSpec::optional("chapter_count", r"- Chapters: (.*?) -"),
    FieldSpec::required("word_count", r"- Words: (.*?) -"),
    FieldSpec::optional("updated", r"- Updated: (.*?) -"),
    FieldSpec::optional("published", r"- Published: (.*?) -"),
    FieldSpec::optional("status", r"- Status: (Complete) -"),
];

pub const CHAPTER_START: &str = "<div class='storytext xcontrast_txt nocopy' id='storytext'>";
pub const CHAPTER_END_MANY: &str =
    "</div><div style='height:5px'></div><div style='clear:both;text-align:right;'>";
pub const CHAPTER_END_ONE: &str = "</div><div style='height:5px'></div>\n<script>";

static CURATED_CHAPTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" - Chapters: [\d,]*").expect("static regex"));
static CURATED_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" - Words: .*$").expect("static regex"));

static PAGE_MAP: LazyLock<FieldMap> =
    LazyLock::new(|| FieldMap::compile(&PAGE_FIELDS).expect("static regex"));
static CHAPTER_TITLE_MAP: LazyLock<FieldMap> =
    LazyLock::new(|| FieldMap::compile(&CHAPTER_TITLES).expect("static regex"));
static TOKEN_MAP: LazyLock<FieldMap> =
    LazyLock::new(|| FieldMap::compile(&TOKEN_FIELDS).expect("static regex"));

/// Adapter for www.fanfiction.net and m.fanfiction.net story URLs (and bare ids).
#[derive(Debug, Default)]
pub struct FanFictionNet;

impl FanFictionNet {
    pub fn new() -> Self {
        Self
    }

    /// Numeric story id from a bare id or a `/s/{id}/...` URL on a known host.
    pub fn story_id(input: &str) -> Result<u64, ScraperError> {
        let input = input.trim();
        if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
            return input.parse().map_err(|_| ScraperError::InvalidUrl {
                input: input.to_string(),
                reason: "story id out of range".to_string(),
            });
        }
        let url = Url::parse(input).map_err(|e| ScraperError::InvalidUrl {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        let host = url.host_str().unwrap_or_default();
        if !HOSTS.contains(&host) {
            return Err(ScraperError::UnsupportedSite {
                input: input.to_string(),
            });
        }
        let mut segments = url.path_segments().into_iter().flatten();
        match (segments.next(), segments.next()) {
            (Some("s"), Some(id)) if !id.is_empty() => {
                id.parse().map_err(|_| ScraperError::InvalidUrl {
                    input: input.to_string(),
                    reason: format!("'{}' is not a story id", id),
                })
            }
            _ => Err(ScraperError::InvalidUrl {
                input: input.to_string(),
                reason: "expected a story URL like https://www.fanfiction.net/s/1234567/1/"
                    .to_string(),
            }),
        }
    }
}

/// Insert `Status: In Progress` before the id token when the story is not complete.
fn insert_status(tokens: &str) -> String {
    if tokens.contains("Status: Complete") {
        tokens.to_string()
    } else {
        tokens.replacen("- id:", "- Status: In Progress - id:", 1)
    }
}

/// Tokens without the `Rated:` prefix, the chapter count and everything from the word count on.
fn curate_tokens(tokens: &str) -> String {
    let t = tokens.strip_prefix("Rated: ").unwrap_or(tokens);
    let t = CURATED_WORDS.replace(t, "");
    CURATED_CHAPTERS.replace_all(&t, "").trim().to_string()
}

/// Rating and language: the first two ` - ` segments of the token block.
fn rating_and_language(tokens: &str) -> (String, String) {
    let mut segments = tokens.split(" - ").map(str::trim);
    let rating = match segments.next().and_then(|s| s.strip_prefix("Rated:")) {
        Some(r) => r.trim(),
        None => return (String::new(), "Unknown".to_string()),
    };
    let rating = rating.strip_prefix("Fiction ").unwrap_or(rating).to_string();
    let language = segments
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown")
        .to_string();
    (rating, language)
}

/// Slice found titles to `count`, padding when the page lists fewer.
fn chapter_titles(found: &[&str], count: u32, story_title: &str) -> Vec<String> {
    (1..=count)
        .map(|n| match found.get(n as usize - 1) {
            Some(t) => t.trim().to_string(),
            None if count == 1 => story_title.to_string(),
            None => format!("Chapter {}", n),
        })
        .collect()
}

impl SiteAdapter for FanFictionNet {
    fn name(&self) -> &'static str {
        SITE_NAME
    }

    fn matches(&self, input: &str) -> bool {
        let input = input.trim();
        if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
            return true;
        }
        Url::parse(input)
            .ok()
            .and_then(|u| u.host_str().map(|h| HOSTS.contains(&h)))
            .unwrap_or(false)
    }

    fn canonical_url(&self, input: &str) -> Result<String, ScraperError> {
        Ok(format!("{}/s/{}/1/", BASE_URL, Self::story_id(input)?))
    }

    fn chapter_url(&self, story: &Story, chapter: u32) -> String {
        format!("{}/s/{}/{}/", BASE_URL, story.numeric_id, chapter)
    }

    fn parse_story(&self, url: &str, html: &str) -> Result<Story, ScraperError> {
        let numeric_id = Self::story_id(url)?;
        let page = PAGE_MAP.extract(html)?;

        let raw_tokens = strip_tags(page.require("tokens")?);
        let raw_tokens = raw_tokens.trim();
        // Pad so the leading and trailing tokens also sit between " - " separators.
        let padded = format!("- {} -", raw_tokens);
        let tokens = TOKEN_MAP.extract(&padded)?;

        let chapter_count = match tokens.get("chapter_count") {
            Some(raw) => u32::try_from(parse_grouped_number("chapter_count", raw)?).map_err(
                |_| ScraperError::InvalidNumber {
                    field: "chapter_count",
                    value: raw.to_string(),
                },
            )?,
            None => 1,
        }
        .max(1);
        let word_count = parse_grouped_number("word_count", tokens.require("word_count")?)?;
        let status = if tokens.get("status").is_some() {
            Status::Complete
        } else {
            Status::InProgress
        };

        let title = story_title_case(page.require("title")?);
        let titles = CHAPTER_TITLE_MAP.extract(html)?;
        let chapter_titles = chapter_titles(titles.all("chapter_titles"), chapter_count, &title);
        let (rating, language) = rating_and_language(raw_tokens);
        let tokens_with_status = insert_status(raw_tokens);

        tracing::debug!(
            numeric_id,
            chapter_count,
            word_count,
            status = %status,
            "parsed fanfiction.net story page"
        );

        Ok(Story {
            site: SITE_NAME.to_string(),
            site_dir: SITE_NAME.to_string(),
            numeric_id,
            text_id: clean_text_id(page.require("text_id")?),
            title,
            author: page.require("author")?.trim().to_string(),
            author_url: page
                .get("author_id")
                .map(|id| format!("{}/u/{}/", BASE_URL, id)),
            summary: page.require("summary")?.trim().to_string(),
            universe: page
                .get("universe")
                .map(|u| title_case(u.trim()))
                .unwrap_or_else(|| "Unknown".to_string()),
            language,
            rating,
            status,
            chapter_count,
            word_count,
            chapter_titles,
            published: tokens.get("published").unwrap_or_default().to_string(),
            updated: tokens
                .get("updated")
                .unwrap_or(NEVER_UPDATED)
                .to_string(),
            url: format!("{}/s/{}/1/", BASE_URL, numeric_id),
            chapter_url_pattern: None,
            curated_tokens: curate_tokens(&tokens_with_status),
            tokens: tokens_with_status,
        })
    }

    fn split_chapter(&self, html: &str, chapter_count: u32) -> Result<String, ScraperError> {
        let html = html.replace("noshade>", "noshade/>");
        let start = html.find(CHAPTER_START).ok_or(ScraperError::Markup {
            marker: "start",
            url: None,
        })?;
        let rest = &html[start..];
        let end_marker = if chapter_count > 1 {
            CHAPTER_END_MANY
        } else {
            CHAPTER_END_ONE
        };
        let end = rest.find(end_marker).ok_or(ScraperError::Markup {
            marker: "end",
            url: None,
        })?;
        Ok(rest[..end].to_string())
    }
}
