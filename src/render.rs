//! Pure rendering of chapter and informations pages, plus the navigation link helpers
//! used by incremental updates.

use crate::model::{chapter_file_name, Story};
use crate::templates::{self, InformationsPage, NOTHING_MORE};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Date format used on informations and directory statistics pages.
pub const WRITTEN_AT_FORMAT: &str = "%H:%M - %d %B %Y";

static NAV_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<a class='(previous|next)' href='(\d+)\.html'>(Previous|Next) \((\d+)/(\d+)\)</a>")
        .expect("static regex")
});

/// Which side of the index link a navigation anchor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Previous,
    Next,
}

impl Side {
    fn class(self) -> &'static str {
        match self {
            Side::Previous => "previous",
            Side::Next => "next",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Side::Previous => "Previous",
            Side::Next => "Next",
        }
    }
}

/// Link to chapter `target` of `total`, or the placeholder anchor when it does not exist.
fn nav_link(side: Side, target: u32, total: u32) -> String {
    if target == 0 || target > total || total <= 1 {
        return placeholder(side);
    }
    format!(
        "<a class='{}' href='{}'>{} ({}/{})</a>",
        side.class(),
        chapter_file_name(target, total),
        side.label(),
        target,
        total
    )
}

fn placeholder(side: Side) -> String {
    format!("<a class='{}'>{}</a>", side.class(), NOTHING_MORE)
}

fn navigation(story: &Story, chapter_num: u32) -> String {
    let total = story.chapter_count;
    format!(
        "{}\n<a class='index' href='{}'>{} by {}</a>\n{}",
        nav_link(Side::Previous, chapter_num.saturating_sub(1), total),
        story.informations_file_name(),
        story.title,
        story.author,
        nav_link(Side::Next, chapter_num + 1, total)
    )
}

/// Render chapter `chapter_num` around `body` (the split chapter text).
pub fn render_chapter(story: &Story, chapter_num: u32, body: &str) -> String {
    templates::chapter_page(
        &format!("{} | {}", story.title, chapter_num),
        &navigation(story, chapter_num),
        chapter_num,
        story.chapter_title(chapter_num),
        body,
    )
}

/// Table of contents: one entry per chapter, in order.
fn table_of_contents(story: &Story) -> String {
    (1..=story.chapter_count.max(1))
        .map(|n| {
            format!(
                "<a class='chapter' href='{}#chapter-{}'>{}</a>\n",
                chapter_file_name(n, story.chapter_count),
                n,
                story.chapter_title(n)
            )
        })
        .collect()
}

/// Render the informations (index) page. `written_at` is already formatted.
pub fn render_informations(story: &Story, written_at: &str) -> String {
    templates::informations_page(&InformationsPage {
        title: &story.title,
        site: &story.site,
        written_at,
        author_html: &story.author_html(),
        universe: &story.universe,
        url: &story.url,
        summary: &story.summary,
        tokens: &story.tokens,
        chapter_count: story.chapter_count,
        table_of_contents: &table_of_contents(story),
    })
}

/// Rewrite an already-rendered chapter page for a story that now has `new_total` chapters:
/// every navigation total is replaced, and a missing next link is inserted when
/// `chapter_num` is no longer the last chapter. The zero-padding width must be unchanged.
pub fn patch_navigation(html: &str, chapter_num: u32, new_total: u32) -> String {
    let patched = NAV_LINK.replace_all(html, |c: &Captures<'_>| {
        format!(
            "<a class='{}' href='{}.html'>{} ({}/{})</a>",
            &c[1], &c[2], &c[3], &c[4], new_total
        )
    });
    if chapter_num >= new_total {
        return patched.into_owned();
    }
    patched.replace(
        &placeholder(Side::Next),
        &nav_link(Side::Next, chapter_num + 1, new_total),
    )
}

/// Point a chapter page's index link at `new_file` instead of `old_file`.
pub fn relink_index(html: &str, old_file: &str, new_file: &str) -> String {
    html.replace(
        &format!("<a class='index' href='{}'>", old_file),
        &format!("<a class='index' href='{}'>", new_file),
    )
}

/// Total chapter count embedded in the first navigation link, if any.
pub fn navigation_total(html: &str) -> Option<u32> {
    NAV_LINK.captures(html).and_then(|c| c[5].parse().ok())
}
