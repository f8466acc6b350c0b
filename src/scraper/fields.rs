//! Declarative field extraction: a table of `{field, pattern, required}` evaluated once
//! against a page, plus the text clean-ups shared by site adapters.

use crate::scraper::error::ScraperError;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;

/// How many matches a field keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// First match only.
    One,
    /// Every match, in page order.
    All,
}

/// One row of a field map. Capture group 1 is the field value.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub pattern: &'static str,
    pub required: bool,
    pub cardinality: Cardinality,
}

impl FieldSpec {
    pub const fn required(name: &'static str, pattern: &'static str) -> Self {
        Self {
            name,
            pattern,
            required: true,
            cardinality: Cardinality::One,
        }
    }

    pub const fn optional(name: &'static str, pattern: &'static str) -> Self {
        Self {
            name,
            pattern,
            required: false,
            cardinality: Cardinality::One,
        }
    }

    pub const fn all(name: &'static str, pattern: &'static str) -> Self {
        Self {
            name,
            pattern,
            required: false,
            cardinality: Cardinality::All,
        }
    }
}

/// Compiled field map.
#[derive(Debug)]
pub struct FieldMap {
    fields: Vec<(FieldSpec, Regex)>,
}

/// Values captured by [FieldMap::extract], borrowed from the page.
#[derive(Debug, Default)]
pub struct Fields<'h> {
    values: HashMap<&'static str, Vec<&'h str>>,
}

impl FieldMap {
    /// Compile every pattern. A bad pattern is reported against its field.
    pub fn compile(specs: &[FieldSpec]) -> Result<Self, ScraperError> {
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            let re = Regex::new(spec.pattern).map_err(|e| ScraperError::InvalidPattern {
                field: spec.name,
                reason: e.to_string(),
            })?;
            fields.push((*spec, re));
        }
        Ok(Self { fields })
    }

    /// Evaluate every field against `text`. Fails on the first required field without a match.
    pub fn extract<'h>(&self, text: &'h str) -> Result<Fields<'h>, ScraperError> {
        let mut out = Fields::default();
        for (spec, re) in &self.fields {
            let matches: Vec<&'h str> = match spec.cardinality {
                Cardinality::One => re
                    .captures(text)
                    .map(|c| vec![capture_value(&c)])
                    .unwrap_or_default(),
                Cardinality::All => re
                    .captures_iter(text)
                    .map(|c| capture_value(&c))
                    .collect(),
            };
            if matches.is_empty() && spec.required {
                return Err(ScraperError::MissingField { field: spec.name });
            }
            tracing::trace!(field = spec.name, found = matches.len(), "field extracted");
            out.values.insert(spec.name, matches);
        }
        Ok(out)
    }
}

/// Group 1 when the pattern has one, otherwise the whole match.
fn capture_value<'h>(c: &regex::Captures<'h>) -> &'h str {
    c.get(1)
        .or_else(|| c.get(0))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

impl<'h> Fields<'h> {
    /// First value of `name`, if it matched.
    pub fn get(&self, name: &str) -> Option<&'h str> {
        self.values.get(name).and_then(|v| v.first().copied())
    }

    /// First value of a required field.
    pub fn require(&self, name: &'static str) -> Result<&'h str, ScraperError> {
        self.get(name)
            .ok_or(ScraperError::MissingField { field: name })
    }

    /// Every value of `name` (empty when it never matched).
    pub fn all(&self, name: &str) -> &[&'h str] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Parse a comma-grouped decimal such as `1,200`. Anything but digits and commas is an error.
pub fn parse_grouped_number(field: &'static str, raw: &str) -> Result<u64, ScraperError> {
    let digits: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ScraperError::InvalidNumber {
            field,
            value: raw.to_string(),
        });
    }
    digits.parse::<u64>().map_err(|_| ScraperError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

/// Upper-case a letter that follows a non-letter, lower-case every other letter.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

/// Contraction suffixes that naive title-casing capitalizes.
const CONTRACTION_FIXES: [(&str, &str); 6] = [
    ("'S", "'s"),
    ("'T", "'t"),
    ("'M", "'m"),
    ("'Ll", "'ll"),
    ("'Ve", "'ve"),
    ("'Re", "'re"),
];

/// Mis-decoded UTF-8 right single quotation mark.
const MOJIBAKE_APOSTROPHE: &str = "\u{e2}\u{20ac}\u{2122}";

/// Title-case a story title, then restore contractions (`It'S` -> `It's`).
pub fn story_title_case(raw: &str) -> String {
    let mut title = title_case(&raw.replace(MOJIBAKE_APOSTROPHE, "'"));
    for (wrong, right) in CONTRACTION_FIXES {
        title = replace_at_word_end(&title, wrong, right);
    }
    title
}

/// Replace `from` with `to` only where `from` is not followed by another letter.
fn replace_at_word_end(s: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find(from) {
        let after = &rest[i + from.len()..];
        out.push_str(&rest[..i]);
        if after.chars().next().is_some_and(char::is_alphabetic) {
            out.push_str(from);
        } else {
            out.push_str(to);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

const ACCENTED: &str = "àäâáãåāéèëêęėēìïîíįīòöôóøōúùüûūÿñç";
const UNACCENTED: &str = "aaaaaaaeeeeeeeiiiiiioooooouuuuuync";

/// Fold common accented Latin letters to ASCII, keeping case.
pub fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| {
            let lower: Vec<char> = c.to_lowercase().collect();
            let is_upper = c.is_uppercase();
            match ACCENTED.chars().position(|a| lower == [a]) {
                Some(i) => {
                    let plain = UNACCENTED.chars().nth(i).unwrap_or(c);
                    if is_upper {
                        plain.to_ascii_uppercase()
                    } else {
                        plain
                    }
                }
                None => c,
            }
        })
        .collect()
}

/// Percent-decode and accent-fold a slug, lower-case it and replace anything outside
/// `[a-z0-9-]` with `-` (`Shengc%C3%BAn` -> `shengcun`, `..%2Fx` -> `---x`).
pub fn clean_text_id(raw: &str) -> String {
    let decoded = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
    fold_accents(&decoded)
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '-',
        })
        .collect()
}

/// Remove every `<...>` tag.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
