//! ultimatehpfanfiction.com adapter. The site lists the stories of a collection in one
//! table; a single pattern reads every row and the row whose link carries the requested
//! position is the story. Only finished English Harry Potter stories are hosted.

use crate::model::{Status, Story, NEVER_UPDATED};
use crate::scraper::error::ScraperError;
use crate::scraper::fields::{clean_text_id, parse_grouped_number};
use crate::scraper::{Fetch, SiteAdapter};
use crate::templates::group_thousands;
use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;

pub const SITE_NAME: &str = "ultimatehpfanfiction.com";
const SITE_DIR: &str = "uhp-fanfiction";
const BASE_URL: &str = "https://www.ultimatehpfanfiction.com";
const HOSTS: [&str; 2] = ["www.ultimatehpfanfiction.com", "ultimatehpfanfiction.com"];
/// Position used when the URL does not name one: the first story of the collection.
const FIRST_POSITION: &str = "a";

pub const LISTING_START: &str =
    "<main id=\"content\" role=\"main\" class=\"px0\"><table border=\"1\" class=\"mb3\">";
pub const LISTING_END: &str = "</table></main>";

/// One listing row: link, title, author, words, timeline, genres, summary.
static LISTING_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"<a class='blue' href='(.*?)'>(.*?)</a> - (.*)\n ?<br />\n ?(\d*) ",
        r"words / (Timeline: .*?)<br />\[(.*?) \]<br />([\n-\x{e2}\x{20ac}\x{a6}]+?)</td></tr>",
    ))
    .expect("static regex")
});
static CHAPTER_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<h1 class='center'>.* - .*</h1><h2 class='center'>Chapter \d+</h2>.*?<div>")
        .expect("static regex")
});
static CHAPTER_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</div><span class='.*?'><a href='.*?'>").expect("static regex")
});

/// Collection path and story position parsed from a story URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
    collection: [String; 2],
    position: String,
}

impl Location {
    fn parse(input: &str) -> Result<Self, ScraperError> {
        let input = input.trim();
        let url = Url::parse(input).map_err(|e| ScraperError::InvalidUrl {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        if !HOSTS.contains(&url.host_str().unwrap_or_default()) {
            return Err(ScraperError::UnsupportedSite {
                input: input.to_string(),
            });
        }
        let segments: Vec<&str> = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        match segments.as_slice() {
            [first, second, rest @ ..] => Ok(Self {
                collection: [first.to_string(), second.to_string()],
                position: rest.first().unwrap_or(&FIRST_POSITION).to_string(),
            }),
            _ => Err(ScraperError::InvalidUrl {
                input: input.to_string(),
                reason: "expected a story URL like https://www.ultimatehpfanfiction.com/{section}/{collection}/"
                    .to_string(),
            }),
        }
    }

    /// Page holding the listing table of the whole collection.
    fn listing_url(&self) -> String {
        format!("{}/{}/{}", BASE_URL, self.collection[0], self.collection[1])
    }

    fn canonical_url(&self) -> String {
        format!("{}/{}/", self.listing_url(), self.position)
    }

    /// The site has no numeric story ids: derive a stable one from the location (FNV-1a).
    fn numeric_id(&self) -> u64 {
        let key = format!("{}/{}/{}", self.collection[0], self.collection[1], self.position);
        let hash = key.bytes().fold(0x811c_9dc5_u32, |h, b| {
            (h ^ u32::from(b)).wrapping_mul(0x0100_0193)
        });
        u64::from(hash)
    }
}

/// Adapter for www.ultimatehpfanfiction.com collection URLs.
#[derive(Debug, Default)]
pub struct UltimateHpFanfiction;

impl UltimateHpFanfiction {
    pub fn new() -> Self {
        Self
    }
}

/// Tabs removed and one table row per line.
fn listing_table(html: &str) -> Result<String, ScraperError> {
    let table = html
        .split_once(LISTING_START)
        .and_then(|(_, rest)| rest.split_once(LISTING_END))
        .map(|(table, _)| table)
        .ok_or(ScraperError::MissingField { field: "listing" })?;
    Ok(table.replace('\t', "").replace("<tr>", "\n<tr>"))
}

impl SiteAdapter for UltimateHpFanfiction {
    fn name(&self) -> &'static str {
        SITE_NAME
    }

    fn matches(&self, input: &str) -> bool {
        Location::parse(input).is_ok()
    }

    fn canonical_url(&self, input: &str) -> Result<String, ScraperError> {
        Ok(Location::parse(input)?.canonical_url())
    }

    fn chapter_url(&self, story: &Story, chapter: u32) -> String {
        match &story.chapter_url_pattern {
            Some(pattern) => pattern.replace("{chapter}", &chapter.to_string()),
            None => format!("{}{}/", story.url, chapter),
        }
    }

    /// The story page is the collection listing, not the canonical URL itself.
    fn fetch_story(&self, fetcher: &mut dyn Fetch, input: &str) -> Result<Story, ScraperError> {
        let location = Location::parse(input)?;
        let html = fetcher.fetch(&location.listing_url())?;
        self.parse_story(&location.canonical_url(), &html)
    }

    fn parse_story(&self, url: &str, html: &str) -> Result<Story, ScraperError> {
        let location = Location::parse(url)?;
        let table = listing_table(html)?;
        let row = LISTING_ROW
            .captures_iter(&table)
            .find(|c| c[1].split('/').nth(3) == Some(location.position.as_str()))
            .ok_or(ScraperError::MissingField { field: "story" })?;

        // `/{section}/{collection}/{position}/{chapter}/{slug...}/{chapter_count}`
        let link: Vec<&str> = row[1].split('/').skip(1).collect();
        let raw_count = link.last().copied().unwrap_or_default();
        let chapter_count = u32::try_from(parse_grouped_number("chapter_count", raw_count)?)
            .map_err(|_| ScraperError::InvalidNumber {
                field: "chapter_count",
                value: raw_count.to_string(),
            })?
            .max(1);
        let slug = link.get(4..).unwrap_or_default().join("/");
        let word_count = parse_grouped_number("word_count", &row[4])?;
        let title = row[2].trim().to_string();
        let curated_tokens = format!("{} - {}", &row[5], row[6].replace(' ', "/"));

        tracing::debug!(url, chapter_count, word_count, "parsed ultimatehpfanfiction.com listing");

        Ok(Story {
            site: SITE_NAME.to_string(),
            site_dir: SITE_DIR.to_string(),
            numeric_id: location.numeric_id(),
            text_id: clean_text_id(&title),
            author: row[3].trim().to_string(),
            author_url: None,
            summary: row[7].trim().to_string(),
            universe: "Harry Potter".to_string(),
            language: "English".to_string(),
            rating: String::new(),
            status: Status::Complete,
            chapter_count,
            word_count,
            chapter_titles: (1..=chapter_count).map(|n| format!("Chapter {}", n)).collect(),
            published: String::new(),
            updated: NEVER_UPDATED.to_string(),
            url: location.canonical_url(),
            chapter_url_pattern: Some(format!(
                "{}/{}/{{chapter}}/{}",
                location.listing_url(),
                location.position,
                slug
            )),
            tokens: format!("{} - Words: {}", curated_tokens, group_thousands(word_count)),
            curated_tokens,
            title,
        })
    }

    fn split_chapter(&self, html: &str, _chapter_count: u32) -> Result<String, ScraperError> {
        let start = CHAPTER_START.find(html).ok_or(ScraperError::Markup {
            marker: "start",
            url: None,
        })?;
        let rest = &html[start.end()..];
        let end = CHAPTER_END.find(rest).ok_or(ScraperError::Markup {
            marker: "end",
            url: None,
        })?;
        Ok(rest[..end.start()].to_string())
    }
}
