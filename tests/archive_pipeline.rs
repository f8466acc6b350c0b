//! End-to-end runs of the archiver against an in-memory fanfiction.net.

use ffarchive::archive::{batch_exit_code, Archiver, Mode};
use ffarchive::catalog::{Catalog, Column, Value};
use ffarchive::scraper::fanfiction::{CHAPTER_END_MANY, CHAPTER_END_ONE, CHAPTER_START};
use ffarchive::scraper::{Fetch, ScraperError, SiteRegistry};
use ffarchive::stats;
use ffarchive::writer::Outcome;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

struct Published {
    slug: &'static str,
    title: &'static str,
    chapters: u32,
    words: &'static str,
}

/// Story pages keyed by numeric id; unknown ids answer 404.
#[derive(Default)]
struct FakeSite {
    stories: HashMap<u64, Published>,
    requests: Vec<String>,
}

impl FakeSite {
    fn publish(&mut self, id: u64, slug: &'static str, title: &'static str, chapters: u32) {
        self.stories.insert(
            id,
            Published {
                slug,
                title,
                chapters,
                words: "12,345",
            },
        );
    }

    fn page(id: u64, story: &Published, chapter: u32) -> String {
        let chapters_token = if story.chapters > 1 {
            format!(" - Chapters: {}", story.chapters)
        } else {
            String::new()
        };
        let options: String = if story.chapters > 1 {
            (1..=story.chapters)
                .map(|n| format!("<option value={} >{}. Chapter {} of {}", n, n, n, story.title))
                .collect()
        } else {
            String::new()
        };
        let end = if story.chapters > 1 {
            CHAPTER_END_MANY
        } else {
            CHAPTER_END_ONE
        };
        format!(
            "<html><head><title>{title} Chapter {chapter}, a Naruto fanfic | FanFiction</title></head>\n\
<body><div id=profile_top>\n\
<b class='xcontrast_txt'>{title}</b>\n\
<span class='xcontrast_txt'>By:</span> <a class='xcontrast_txt' href='/u/42/Writer'>Writer</a>\n\
<a href=\"//www.fanfiction.net/s/{id}/1/{slug}\">\n\
<div style='margin-top:2px' class='xcontrast_txt'>A summary.</div>\n\
<span class='xgray xcontrast_txt'>Rated: <a class='xcontrast_txt' href='https://www.fictionratings.com/'>Fiction K</a> - English - Adventure{chapters_token} - Words: {words} - Published: <span data-xutime='1'>Jan 1, 2020</span> - id: {id} </span>\n\
</div>\n\
<select id=chap_select>{options}</select>\n\
{start}<p>Text of chapter {chapter}.</p>{end}</div>\n\
<select id=chap_select>{options}</select>\n\
</body></html>",
            title = story.title,
            chapter = chapter,
            id = id,
            slug = story.slug,
            chapters_token = chapters_token,
            words = story.words,
            options = options,
            start = CHAPTER_START,
            end = end,
        )
    }
}

impl Fetch for FakeSite {
    fn fetch(&mut self, url: &str) -> Result<String, ScraperError> {
        self.requests.push(url.to_string());
        let not_found = || ScraperError::HttpStatus {
            status: 404,
            url: url.to_string(),
        };
        let parts: Vec<&str> = url
            .strip_prefix("https://www.fanfiction.net/s/")
            .ok_or_else(not_found)?
            .trim_end_matches('/')
            .split('/')
            .collect();
        let id: u64 = parts[0].parse().map_err(|_| not_found())?;
        let chapter: u32 = parts[1].parse().map_err(|_| not_found())?;
        let story = self.stories.get(&id).ok_or_else(not_found)?;
        if chapter > story.chapters {
            return Err(not_found());
        }
        Ok(Self::page(id, story, chapter))
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

const FIRST: &str = "https://www.fanfiction.net/s/1001/1/";

#[test]
fn download_then_update_then_up_to_date() -> Result<(), Box<dyn std::error::Error>> {
    let library = tempfile::tempdir()?;
    let registry = SiteRegistry::with_defaults();
    let mut catalog = Catalog::open(library.path().join("catalog.json"))?;
    let mut site = FakeSite::default();
    site.publish(1001, "Leaf-Days", "leaf days", 3);

    let outcome = Archiver::new(library.path(), &registry, &mut catalog, &mut site)
        .process_story("https://www.fanfiction.net/s/1001/2/Leaf-Days", Mode::Download)?;
    assert_eq!(outcome, Outcome::Downloaded { chapters: 3 });
    assert_eq!(outcome.exit_code(), 0);

    let dir = library.path().join("fanfiction.net/leaf-days_1001");
    assert_eq!(chapter_files(&dir), vec!["1.html", "2.html", "3.html"]);
    assert!(dir.join("leaf-days_informations.html").is_file());
    assert!(dir.join(".1001").is_file());
    assert!(library.path().join("assets/css/chapter.css").is_file());
    let chapter = fs::read_to_string(dir.join("2.html"))?;
    assert!(chapter.contains("<p>Text of chapter 2.</p>"));
    assert!(chapter.contains("<a class='next' href='3.html'>Next (3/3)</a>"));
    assert_eq!(
        catalog.get(Column::Title, FIRST),
        Some(Value::Text("Leaf Days".to_string()))
    );
    catalog.set_read(FIRST, true)?;

    // Two chapters are published.
    site.publish(1001, "Leaf-Days", "leaf days", 5);
    site.requests.clear();
    let outcome = Archiver::new(library.path(), &registry, &mut catalog, &mut site)
        .process_story("1001", Mode::Update)?;
    assert_eq!(outcome, Outcome::Updated { chapters: 2 });
    assert_eq!(outcome.exit_code(), 20);
    assert_eq!(
        site.requests,
        vec![
            FIRST.to_string(),
            "https://www.fanfiction.net/s/1001/4/".to_string(),
            "https://www.fanfiction.net/s/1001/5/".to_string(),
        ]
    );
    assert_eq!(
        chapter_files(&dir),
        vec!["1.html", "2.html", "3.html", "4.html", "5.html"]
    );
    let third = fs::read_to_string(dir.join("3.html"))?;
    assert!(third.contains("<a class='next' href='4.html'>Next (4/5)</a>"));
    assert_eq!(catalog.get(Column::ChapterCount, FIRST), Some(Value::Int(5)));
    assert_eq!(catalog.get(Column::Read, FIRST), Some(Value::Bool(true)));

    site.requests.clear();
    let outcome = Archiver::new(library.path(), &registry, &mut catalog, &mut site)
        .process_story(FIRST, Mode::Update)?;
    assert_eq!(outcome, Outcome::UpToDate);
    assert_eq!(outcome.exit_code(), 21);
    assert_eq!(site.requests, vec![FIRST.to_string()]);
    Ok(())
}

#[test]
fn batch_continues_past_failures() -> Result<(), Box<dyn std::error::Error>> {
    let library = tempfile::tempdir()?;
    let registry = SiteRegistry::with_defaults();
    let mut catalog = Catalog::open(library.path().join("catalog.json"))?;
    let mut site = FakeSite::default();
    site.publish(1001, "Leaf-Days", "leaf days", 2);
    site.publish(2002, "Sand", "sand", 1);

    let reports = Archiver::new(library.path(), &registry, &mut catalog, &mut site)
        .process_batch(&["1001", "3003", "not a story", "2002"], Mode::Download);
    assert_eq!(reports.len(), 4);
    assert!(reports[0].result.is_ok());
    assert_eq!(reports[1].result.as_ref().map_err(|e| e.exit_code()).unwrap_err(), 2);
    assert_eq!(reports[2].result.as_ref().map_err(|e| e.exit_code()).unwrap_err(), 1);
    assert!(matches!(
        reports[3].result,
        Ok(Outcome::Downloaded { chapters: 1 })
    ));
    assert_eq!(batch_exit_code(&reports), 4);

    let one_shot = library.path().join("fanfiction.net/sand_2002");
    assert_eq!(chapter_files(&one_shot), vec!["1.html"]);
    assert!(!library.path().join("fanfiction.net/3003").exists());

    // Everything cataloged is updated; nothing new was published.
    let reports = Archiver::new(library.path(), &registry, &mut catalog, &mut site).update_all();
    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|r| matches!(r.result, Ok(Outcome::UpToDate))));
    assert_eq!(batch_exit_code(&reports), 0);

    let page = stats::write_site_statistics(library.path(), &catalog, "fanfiction.net")?
        .ok_or("statistics not written")?;
    let html = fs::read_to_string(page)?;
    assert!(html.contains("Stories: 2"));
    assert!(html.contains("Chapters: 3"));
    Ok(())
}

#[test]
fn informations_requires_a_cataloged_story() -> Result<(), Box<dyn std::error::Error>> {
    let library = tempfile::tempdir()?;
    let registry = SiteRegistry::with_defaults();
    let mut catalog = Catalog::open(library.path().join("catalog.json"))?;
    let mut site = FakeSite::default();
    site.publish(1001, "Leaf-Days", "leaf days", 2);

    let err = Archiver::new(library.path(), &registry, &mut catalog, &mut site)
        .process_story("1001", Mode::Informations)
        .unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert!(site.requests.is_empty());

    Archiver::new(library.path(), &registry, &mut catalog, &mut site)
        .process_story("1001", Mode::Download)?;
    let info = library
        .path()
        .join("fanfiction.net/leaf-days_1001/leaf-days_informations.html");
    fs::remove_file(&info)?;
    let outcome = Archiver::new(library.path(), &registry, &mut catalog, &mut site)
        .with_written_at("09:30 - 02 February 2024")
        .process_story("1001", Mode::Informations)?;
    assert_eq!(outcome, Outcome::InformationsRefreshed);
    assert!(fs::read_to_string(&info)?.contains("09:30 - 02 February 2024"));
    Ok(())
}

#[test]
fn retitled_story_keeps_one_directory() -> Result<(), Box<dyn std::error::Error>> {
    let library = tempfile::tempdir()?;
    let registry = SiteRegistry::with_defaults();
    let mut catalog = Catalog::open(library.path().join("catalog.json"))?;
    let mut site = FakeSite::default();
    site.publish(1001, "Leaf-Days", "leaf days", 3);
    Archiver::new(library.path(), &registry, &mut catalog, &mut site)
        .process_story("1001", Mode::Download)?;

    site.publish(1001, "Leaf-Days-Renamed", "leaf days renamed", 3);
    site.requests.clear();
    let outcome = Archiver::new(library.path(), &registry, &mut catalog, &mut site)
        .process_story("1001", Mode::Update)?;
    assert_eq!(outcome, Outcome::UpToDate);
    assert_eq!(site.requests, vec![FIRST.to_string()]);

    let site_dir = library.path().join("fanfiction.net");
    let dirs: Vec<String> = fs::read_dir(&site_dir)?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    assert_eq!(dirs, vec!["leaf-days-renamed_1001"]);
    let dir = site_dir.join("leaf-days-renamed_1001");
    assert_eq!(chapter_files(&dir), vec!["1.html", "2.html", "3.html"]);
    assert!(dir.join("leaf-days-renamed_informations.html").is_file());

    let stats = stats::DirectoryStatistics::collect(&site_dir)?;
    assert_eq!(stats.stories.len(), 1);
    assert_eq!(
        catalog.get(Column::Title, FIRST),
        Some(Value::Text("Leaf Days Renamed".to_string()))
    );
    Ok(())
}
