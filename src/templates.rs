//! Fixed page skeletons and static assets. Callers pass already-built HTML fragments;
//! nothing here escapes its input.

/// Assets written under `{library}/assets/`, as `(relative path, content)`.
pub const ASSETS: [(&str, &str); 4] = [
    ("css/chapter.css", CHAPTER_CSS),
    ("css/informations.css", INFORMATIONS_CSS),
    ("css/statistics.css", STATISTICS_CSS),
    ("js/sorting.js", SORTING_JS),
];

/// Library-relative directory holding [ASSETS].
pub const ASSETS_DIR: &str = "assets";

/// Anchor with no target, used where a previous or next chapter does not exist.
pub const NOTHING_MORE: &str = "Nothing more this way";

/// `1234567` -> `1,234,567`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// One chapter file. `navigation` is repeated above and below the text.
pub fn chapter_page(
    page_title: &str,
    navigation: &str,
    chapter_num: u32,
    chapter_title: &str,
    body: &str,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>

<head>
    <meta http-equiv="Content-Type" content="text/html; charset=utf-8">
    <meta name="viewport" content="initial-scale=1">
    <title>{page_title}</title>
    <link rel="stylesheet" href="../../assets/css/chapter.css">
</head>

<body>

<article class='main content'>

<div class='container'>
{navigation}
</div>

<hr size=1 noshade/>

<h1 class='title'><a name='chapter-{chapter_num}' id='chapter-{chapter_num}'>{chapter_title}</a></h1>
<hr size='1' noshade/>

<div class='text'>
{body}</div>
</div>

<hr size=1 noshade/>

<div class='container'>
{navigation}
</div>

</article>

</body>
</html>
"#
    )
}

/// Values substituted into the informations page.
pub struct InformationsPage<'a> {
    pub title: &'a str,
    pub site: &'a str,
    pub written_at: &'a str,
    pub author_html: &'a str,
    pub universe: &'a str,
    pub url: &'a str,
    pub summary: &'a str,
    pub tokens: &'a str,
    pub chapter_count: u32,
    /// One `<a class='chapter'>` per line.
    pub table_of_contents: &'a str,
}

pub fn informations_page(p: &InformationsPage<'_>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>

<head>
    <meta http-equiv="Content-Type" content="text/html; charset=utf-8">
    <meta name="viewport" content="initial-scale=1">
    <title>{title} | Informations</title>
    <link rel="stylesheet" href="../../assets/css/informations.css">
</head>

<body>

<article>

<div class='container'>
<a class='infos' href="../../{site}_statistics.html">Statistics for {site}</a>
<span class='infos'>{written_at}</span>
</div>

<hr size=1 noshade/>
<h1>{title}</h1>
<hr size=1 noshade/>

<div class='container'>
<span class='infos'>{author}</span>
<span class='infos'>{universe}</span>
</div>

<hr size=1 noshade/>

<a class='url' href='{url}'>{url}</a>

<hr size=1 noshade/>

<p>{summary}</p>

<p><em>{tokens}</em></p>

<hr size=1 noshade/>

<p><strong>Chapters ({chapter_count}):</strong></p>

<nav class='toc'>
{toc}</nav>

</article>

</body>
</html>
"#,
        title = p.title,
        site = p.site,
        written_at = p.written_at,
        author = p.author_html,
        universe = p.universe,
        url = p.url,
        summary = p.summary,
        tokens = p.tokens,
        chapter_count = group_thousands(u64::from(p.chapter_count)),
        toc = p.table_of_contents,
    )
}

/// Totals shown at the top of a site statistics page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SiteTotals {
    pub authors: usize,
    pub universes: usize,
    pub chapters: u64,
    pub words: u64,
    pub stories: usize,
    pub read: usize,
    pub unread: usize,
    pub series: usize,
}

/// Site statistics page; `rows` is a run of `<tr>` elements.
pub fn site_statistics_page(site: &str, totals: &SiteTotals, rows: &str) -> String {
    let n = |v: usize| group_thousands(v as u64);
    format!(
        r#"<!DOCTYPE html>
<html>

<head>
    <meta http-equiv="Content-Type" content="text/html; charset=utf-8">
    <meta name="viewport" content="initial-scale=1">
    <title>Statistics | {site}</title>
    <link rel="stylesheet" href="assets/css/statistics.css">
</head>
<body>

<script src="assets/js/sorting.js"></script>

<div class="general">
    <h1>Statistics | {site}</h1>
    <p>Authors: {authors} - Universes: {universes} - Chapters: {chapters} - Words: {words} - Stories: {stories} - Read: {read} - Unread: {unread} - Series: {series}</p>
</div>
<hr size=1 noshade/>

<table id="stories-table">
<thead>
<tr>
    <th onclick="sortTable(0)">Title</th>
    <th onclick="sortTable(1)">Read</th>
    <th onclick="sortTable(2)">Author</th>
    <th onclick="sortTable(3)">Universe</th>
    <th onclick="sortTable(4)">Status</th>
    <th onclick="sortTable(5)">Chapters</th>
    <th onclick="sortTable(6)">Words</th>
    <th onclick="sortTable(7)">Tokens</th>
    <th onclick="sortTable(8)">Series</th>
</tr>
</thead>
<tbody>
{rows}
</tbody>
</table>
</body>
</html>
"#,
        authors = n(totals.authors),
        universes = n(totals.universes),
        chapters = group_thousands(totals.chapters),
        words = group_thousands(totals.words),
        stories = n(totals.stories),
        read = n(totals.read),
        unread = n(totals.unread),
        series = n(totals.series),
    )
}

/// Cells of one site statistics row.
pub struct SiteRow<'a> {
    pub num: usize,
    pub title: &'a str,
    pub informations_path: &'a str,
    pub url: &'a str,
    pub summary: &'a str,
    pub read: bool,
    pub author: &'a str,
    pub universe: &'a str,
    pub status: &'a str,
    pub status_class: &'a str,
    pub chapter_count: u32,
    pub word_count: u64,
    pub curated_tokens: &'a str,
    /// Series name with position, or empty.
    pub series: &'a str,
}

pub fn site_statistics_row(r: &SiteRow<'_>) -> String {
    let (read_class, read_text) = if r.read {
        ("read", "Read")
    } else {
        ("unread", "Unread")
    };
    format!(
        r#"<tr>
    <td onclick="sortTable(0)">
        <strong>{title}</strong>
        <a href="{path}">Informations &amp; Index</a>
        <hr size=1 noshade/>
        <a href="{url}">Webpage</a>
        <p><em>(N° {num})</em> {summary}</p>
    </td>
    <td onclick="sortTable(1)" class="{read_class}">{read_text}</td>
    <td onclick="sortTable(2)">{author}</td>
    <td onclick="sortTable(3)">{universe}</td>
    <td onclick="sortTable(4)" class="{status_class}">{status}</td>
    <td onclick="sortTable(5)">{chapters} chapter(s)</td>
    <td onclick="sortTable(6)">{words} words</td>
    <td onclick="sortTable(7)">{tokens}</td>
    <td onclick="sortTable(8)">{series}</td>
</tr>
"#,
        title = r.title,
        path = r.informations_path,
        url = r.url,
        num = r.num,
        summary = r.summary,
        author = r.author,
        universe = r.universe,
        status_class = r.status_class,
        status = r.status,
        chapters = group_thousands(u64::from(r.chapter_count)),
        words = group_thousands(r.word_count),
        tokens = r.curated_tokens,
        series = r.series,
    )
}

/// Header of a directory statistics page, including its inline style.
pub fn directory_statistics_intro(
    written_at: &str,
    universes: usize,
    stories: usize,
    words: u64,
    chapters: u64,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8" />
    <style>
{style}    </style>
</head><body>
<h1>Stats</h1>
<strong>Informations:</strong>
<ul>
<li>Last update: {written_at},</li>
<li>{universes} universe{plural},</li>
<li>{stories} stories,</li>
<li>{words} words,</li>
<li>{chapters} chapters.</li>
</ul>

<br />
<div class='universe' style='font-weight: bold;'>
<div class='universe_name'>Universe</div>
<div class='universe_count'>Stories</div>
</div><br />
"#,
        style = DIRECTORY_STATISTICS_STYLE,
        universes = group_thousands(universes as u64),
        plural = if universes > 1 { "s" } else { "" },
        stories = group_thousands(stories as u64),
        words = group_thousands(words),
        chapters = group_thousands(chapters),
    )
}

pub fn directory_universe_row(universe: &str, count: usize) -> String {
    format!(
        "\n<div class='universe'>\n<div class='universe_name'>• {}</div>\n<div class='universe_count'>{} stor{}</div>\n</div><br />\n",
        universe,
        group_thousands(count as u64),
        if count > 1 { "ies" } else { "y" }
    )
}

pub const DIRECTORY_STORIES_INTRO: &str = "\n<br />\n<div class='story' style='font-weight: bold;'><div class='s_title'>Story</div><div class='s_words'>Words</div><div class='s_chap'>Chapters</div><div class='s_ratio'>Ratio W/C</div>\n</div><br />\n";

/// Cells of one directory statistics story entry.
pub struct DirectoryStory<'a> {
    pub numeric_id: &'a str,
    pub link: &'a str,
    pub title: &'a str,
    pub universe: &'a str,
    pub status: &'a str,
    pub word_count: u64,
    pub chapter_count: u64,
    pub ratio: u64,
    pub summary: &'a str,
}

pub fn directory_story_row(s: &DirectoryStory<'_>) -> String {
    format!(
        "\n<div class='story' title='{id}'>\n<div class='s_title'>• <a href='{link}'>{title}</a><br/>\n<em>{universe} - {status}</em></div>\n<div class='s_words'>{words} words</div>\n<div class='s_chap'>{chapters} chapters</div>\n<div class='s_ratio'>~{ratio} w/c</div>\n</div>\n<div class='s_summary'>    {summary}</div><br/>\n",
        id = s.numeric_id,
        link = s.link,
        title = s.title,
        universe = s.universe,
        status = s.status,
        words = group_thousands(s.word_count),
        chapters = group_thousands(s.chapter_count),
        ratio = group_thousands(s.ratio),
        summary = s.summary,
    )
}

pub const DIRECTORY_STATISTICS_END: &str = "</body>\n</html>\n";

const DIRECTORY_STATISTICS_STYLE: &str = r#"        * {
            font-family: "Helvetica";
            font-size: 20px;
            text-align: left;
        }
        h1 { font-size: 26px; }
        div { padding: 0px; }
        .story, .universe {
            width: 100%;
            display: flex;
            flex-wrap: nowrap;
        }
        .universe_name { width: 80%; }
        .universe_count { width: 20%; text-align: center; }
        .s_title {
            width: 50%;
            word-wrap: break-word;
        }
        .s_words, .s_chap, .s_ratio { text-align: center; }
        .s_words { width: 17%; }
        .s_chap { width: 15%; }
        .s_ratio { width: 18%; }
        .s_summary {
            width: 100%;
            word-wrap: break-word;
            font-style: italic;
        }
        em { font-size: 16px; }
"#;

pub const CHAPTER_CSS: &str = r#"body {
    color: #C0C0C0;
    background-color: #303030;
    text-rendering: optimizeLegibility;
    font-family: -apple-system-font, 'Helvetica', Arial, Verdana, sans-serif;
    -webkit-font-smoothing: subpixel-antialiased;
    margin: 0 auto;
    max-width: 600px;
}
article {
    background-color: #505050;
    box-shadow: 12px 0 6px rgba(0, 0, 0, 0.4), -12px 0 6px rgba(0, 0, 0, 0.4);
    padding: 2%;
    margin: 0;
}
p { padding: 0.5%; }
.title a { color: inherit; }
.container { display: flex; }
.container a {
    text-decoration: none;
    text-align: center;
    color: #7abac7;
    padding: 1%;
    display: inline-block;
    transition: 0.2s;
}
.previous, .next {
    background-color: #484848;
    width: 31%;
}
.index {
    background-color: #555555;
    width: 32%;
}
.previous, .index { float: left; }
.next { float: right; }
.container a:hover {
    text-decoration: none;
    color: #68f8ff;
}
.previous:hover, .next:hover { background-color: #303030; }
.index:hover { background-color: #797979; }
"#;

pub const INFORMATIONS_CSS: &str = r#"body {
    text-align: justify;
    word-wrap: break-word;
    color: #C0C0C0;
    background-color: #303030;
    text-rendering: optimizeLegibility;
    font-family: -apple-system-font, 'Helvetica', Arial, Verdana, sans-serif;
    -webkit-font-smoothing: subpixel-antialiased;
    margin: 0 auto;
    max-width: 600px;
}
article {
    background-color: #505050;
    box-shadow: 12px 0 6px rgba(0, 0, 0, 0.4), -12px 0 6px rgba(0, 0, 0, 0.4);
    padding: 2%;
    margin: 0;
}
h1 {
    color: #FFFFFF;
    text-align: center;
}
.container { display: flex; }
a {
    text-decoration: none;
    display: inline-block;
    color: #7abac7;
    transition: 0.2s;
}
.infos {
    text-align: center;
    background-color: #454545;
    padding: 1.2%;
    display: inline-block;
    width: 49%;
    transition: 0.2s;
}
.url {
    text-align: center;
    padding: 1.2%;
    width: 97.6%;
    background-color: #454545;
}
.chapter {
    padding: 1.2%;
    width: 97.6%;
}
.infos:hover {
    text-decoration: none;
    background-color: #303030;
}
a:hover, .chapter:hover {
    color: #68f8ff;
    text-decoration: none;
    background-color: #303030;
}
"#;

pub const STATISTICS_CSS: &str = r#"body {
    color: #C0C0C0;
    background-color: #505050;
    max-width: 100%;
    text-align: center;
    text-rendering: optimizeLegibility;
    font-family: -apple-system-font, 'Helvetica', Arial, Verdana, sans-serif;
}
.general > p { text-align: center; }
strong {
    padding-bottom: 1.5%;
    display: inline-block;
    color: #FFFFFF;
}
.read, .complete { background-color: #346b35; }
.unread, .progress { background-color: #961010; }
table { border-collapse: collapse; }
th {
    background: #393939;
    font-weight: bold;
}
td, th { border: 1px solid #ccc; }
td {
    text-decoration: none;
    padding-top: 0.5%;
    padding-bottom: 0.5%;
    transition: 0.2s;
}
th:hover, td:hover {
    text-decoration: none;
    color: #FFFFFF;
}
th:hover { background-color: #191919; }
td:hover { background-color: #797979; }
a {
    text-decoration: none;
    color: #7abac7;
    background-color: #454545;
    padding: 1%;
    width: 95%;
    display: inline-block;
    transition: 0.2s;
}
a:hover {
    text-decoration: none;
    color: #68f8ff;
    background-color: #393939;
}
p { text-align: left; }
@media only screen and (max-width: 760px) {
    table, thead, tbody, th, td, tr {
        display: block;
        width: 100%;
    }
    thead tr {
        position: absolute;
        top: -9999px;
        left: -9999px;
    }
    tr { border-bottom: 1px solid #A9A9A9; }
    td {
        border: none;
        position: relative;
    }
}
"#;

/// Click-to-sort for `#stories-table`. Columns 5 and 6 sort numerically.
pub const SORTING_JS: &str = r#"var asc = [-1, 1, 1, 1, 1, 1, 1, 1, 1];

function sortTable(n) {
    var tbody = document.getElementById("stories-table").getElementsByTagName("tbody")[0];
    var rows = Array.prototype.slice.call(tbody.getElementsByTagName("tr"));
    var numeric = (n == 5) || (n == 6);

    function key(row) {
        var text = row.getElementsByTagName("td")[n].textContent.trim().toLowerCase();
        if (numeric) {
            return Number(text.split(" ")[0].replace(/,/g, ""));
        }
        return text;
    }

    rows.sort(function (x, y) {
        var a = key(x);
        var b = key(y);
        if (a == b) { return 0; }
        return (a < b ? -1 : 1) * asc[n];
    });

    rows.forEach(function (row) { tbody.appendChild(row); });
    asc[n] *= -1;
}
"#;
