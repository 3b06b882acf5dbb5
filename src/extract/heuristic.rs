//! Last-resort, pattern-based article extraction from plain text.
//!
//! Nothing here touches the network. Three textual layouts are tried in
//! order; the first one producing any match wins. When none match, bare URLs
//! are turned into articles with a title sniffed from the text before them.

use crate::extract::normalize::{
    DEFAULT_DESCRIPTION, DEFAULT_SOURCE, DEFAULT_TITLE, DEFAULT_URL, MAX_ARTICLES,
};
use crate::models::Article;
use crate::utils::now_iso;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// At most this many URLs become articles in the URL fallback.
const MAX_URL_ARTICLES: usize = 5;

/// How many characters before a URL are searched for a title.
const TITLE_WINDOW_CHARS: usize = 200;

static LAYOUT_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        // Title: ... Description: ... Date: ... URL: ...
        Regex::new(
            r"(?i)Title:\s*([^\n]+)\s*Description:\s*([^\n]+)\s*Date:\s*([^\n]+)\s*URL:\s*([^\n\s]+)",
        )
        .unwrap(),
        // 1. Title - Description (Date) [URL]
        Regex::new(r"(?i)\d+\.\s*([^-\n]+)\s*-\s*([^\n(]+)\s*\(([^)]+)\)\s*\[([^\]]+)\]").unwrap(),
        // ## Title Description Date: ... Source: ...
        Regex::new(r"(?i)##\s*([^\n]+)\s*([^\n]+)\s*Date:\s*([^\n]+)\s*Source:\s*([^\n]+)").unwrap(),
    ]
});

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)https?://[^\s\])}]+").unwrap());

/// A trailing run of 10-100 characters without a period or newline.
static TRAILING_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^.\n]{10,100})\s*$").unwrap());

fn capture_or(caps: &Captures<'_>, idx: usize, default: impl FnOnce() -> String) -> String {
    caps.get(idx)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default)
}

fn source_or_default(source: &str) -> String {
    if source.is_empty() {
        DEFAULT_SOURCE.to_string()
    } else {
        source.to_string()
    }
}

/// Extract articles from labelled or listed text layouts.
///
/// Returns the matches of the first layout that matches at all, capped at
/// [`MAX_ARTICLES`].
pub fn extract_layouts(text: &str, source: &str) -> Vec<Article> {
    for pattern in LAYOUT_PATTERNS.iter() {
        let articles: Vec<Article> = pattern
            .captures_iter(text)
            .take(MAX_ARTICLES)
            .map(|caps| Article {
                title: capture_or(&caps, 1, || DEFAULT_TITLE.to_string()),
                description: capture_or(&caps, 2, || DEFAULT_DESCRIPTION.to_string()),
                date: capture_or(&caps, 3, now_iso),
                source: source_or_default(source),
                canonical_url: capture_or(&caps, 4, || DEFAULT_URL.to_string()),
            })
            .collect();

        if !articles.is_empty() {
            return articles;
        }
    }
    Vec::new()
}

/// Find the longest title-like run ending right before byte offset `url_at`.
fn sniff_title(text: &str, url_at: usize) -> Option<String> {
    let before = &text[..url_at];
    let window_start = before
        .char_indices()
        .rev()
        .nth(TITLE_WINDOW_CHARS - 1)
        .map_or(0, |(idx, _)| idx);

    TRAILING_TITLE
        .captures(&before[window_start..])
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Turn up to five bare URLs into articles.
pub fn extract_urls(text: &str, source: &str, topic: &str) -> Vec<Article> {
    URL_PATTERN
        .find_iter(text)
        .take(MAX_URL_ARTICLES)
        .enumerate()
        .map(|(i, m)| {
            let url = m.as_str();
            // A repeated URL reuses the context of its first occurrence.
            let first_at = text.find(url).unwrap_or(m.start());
            Article {
                title: sniff_title(text, first_at)
                    .unwrap_or_else(|| format!("{} News Article {}", topic, i + 1)),
                description: format!("News article about {} from {}", topic, source),
                date: now_iso(),
                source: source_or_default(source),
                canonical_url: url.to_string(),
            }
        })
        .collect()
}

/// Run the layout patterns, then the URL fallback if they found nothing.
pub fn extract_with_patterns(text: &str, source: &str, topic: &str) -> Vec<Article> {
    let articles = extract_layouts(text, source);
    if !articles.is_empty() {
        return articles;
    }
    extract_urls(text, source, topic)
}
