//! Shared error type for fetching, extraction and chapter splitting.

use thiserror::Error;

/// Broad class of a [ScraperError], used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any I/O (bad URL, chapter out of range).
    Input,
    /// Network failure or HTTP error status.
    Fetch,
    /// A required field did not match, or a numeric token was malformed.
    Parse,
    /// Chapter body boundary markers were not found.
    Markup,
}

#[derive(Debug, Error)]
pub enum ScraperError {
    // Input
    #[error("Invalid story URL or id: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("No supported site matches '{input}'.")]
    UnsupportedSite { input: String },

    #[error("Chapter {chapter} not in range [1; {count}].")]
    ChapterOutOfRange { chapter: u32, count: u32 },

    // Fetch
    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Gave up on {url} after {attempts} attempts: {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse
    #[error("Could not parse story page: field '{field}' not found (invalid story or changed markup).")]
    MissingField { field: &'static str },

    #[error("Could not parse story page: field '{field}' has invalid number '{value}'.")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid pattern for field '{field}': {reason}")]
    InvalidPattern { field: &'static str, reason: String },

    // Markup
    #[error("Could not isolate chapter text: {marker} marker not found{}.", at_suffix(.url))]
    Markup {
        marker: &'static str,
        url: Option<String>,
    },
}

fn at_suffix(url: &Option<String>) -> String {
    url.as_deref()
        .map(|u| format!(" at {}", u))
        .unwrap_or_default()
}

impl ScraperError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScraperError::InvalidUrl { .. }
            | ScraperError::UnsupportedSite { .. }
            | ScraperError::ChapterOutOfRange { .. } => ErrorKind::Input,
            ScraperError::Network { .. }
            | ScraperError::HttpStatus { .. }
            | ScraperError::RetriesExhausted { .. }
            | ScraperError::BodyRead { .. } => ErrorKind::Fetch,
            ScraperError::MissingField { .. }
            | ScraperError::InvalidNumber { .. }
            | ScraperError::InvalidPattern { .. } => ErrorKind::Parse,
            ScraperError::Markup { .. } => ErrorKind::Markup,
        }
    }

    /// Attach the chapter URL to a markup error raised by a pure splitter.
    pub(crate) fn at_url(self, at: &str) -> Self {
        match self {
            ScraperError::Markup { marker, url: None } => ScraperError::Markup {
                marker,
                url: Some(at.to_string()),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            ScraperError::ChapterOutOfRange { chapter: 4, count: 3 }.kind(),
            ErrorKind::Input
        );
        assert_eq!(
            ScraperError::HttpStatus {
                status: 404,
                url: "u".into()
            }
            .kind(),
            ErrorKind::Fetch
        );
        assert_eq!(
            ScraperError::MissingField { field: "author" }.kind(),
            ErrorKind::Parse
        );
        assert_eq!(
            ScraperError::Markup {
                marker: "start",
                url: None
            }
            .kind(),
            ErrorKind::Markup
        );
    }

    #[test]
    fn markup_message_includes_url_once_attached() {
        let err = ScraperError::Markup {
            marker: "start",
            url: None,
        };
        assert_eq!(
            err.to_string(),
            "Could not isolate chapter text: start marker not found."
        );
        let err = err.at_url("https://www.fanfiction.net/s/1/2/");
        assert_eq!(
            err.to_string(),
            "Could not isolate chapter text: start marker not found at https://www.fanfiction.net/s/1/2/."
        );
    }
}
