//! Conversion of loosely shaped candidate objects into [`Article`]s.
//!
//! Models name their fields inconsistently (`headline` vs `title`, `url` vs
//! `link`, ...). Each canonical field is resolved from an ordered list of
//! aliases; the first truthy value wins and a default fills the gap.

use crate::models::Article;
use crate::utils::now_iso;
use serde_json::{Map, Value};

/// Upper bound on articles accepted from one model response.
pub const MAX_ARTICLES: usize = 10;

pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_DESCRIPTION: &str = "No description available";
pub const DEFAULT_SOURCE: &str = "Unknown Source";
pub const DEFAULT_URL: &str = "#";

const TITLE_KEYS: [&str; 2] = ["title", "headline"];
const DESCRIPTION_KEYS: [&str; 3] = ["description", "summary", "content"];
const DATE_KEYS: [&str; 4] = ["date", "published_date", "publishedAt", "created_at"];
const URL_KEYS: [&str; 4] = ["canonical_url", "url", "link", "href"];

/// Render a field as text if it is truthy.
///
/// Empty strings, `null`, `false` and zero count as absent.
fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn first_of(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(truthy_text))
}

/// Whether a raw candidate carries a truthy `title` or `headline`.
pub fn has_title(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| first_of(obj, &TITLE_KEYS).is_some())
}

fn to_article(obj: &Map<String, Value>, default_source: &str) -> Article {
    let source = first_of(obj, &["source"]).unwrap_or_else(|| {
        if default_source.is_empty() {
            DEFAULT_SOURCE.to_string()
        } else {
            default_source.to_string()
        }
    });

    Article {
        title: first_of(obj, &TITLE_KEYS).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        description: first_of(obj, &DESCRIPTION_KEYS)
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        date: first_of(obj, &DATE_KEYS).unwrap_or_else(now_iso),
        source,
        canonical_url: first_of(obj, &URL_KEYS).unwrap_or_else(|| DEFAULT_URL.to_string()),
    }
}

/// Normalize raw candidates into at most [`MAX_ARTICLES`] articles.
///
/// Candidates that are not objects, or that carry neither `title` nor
/// `headline`, are dropped. Relative order is preserved.
pub fn normalize(candidates: &[Value], default_source: &str) -> Vec<Article> {
    candidates
        .iter()
        .filter_map(Value::as_object)
        .filter(|obj| first_of(obj, &TITLE_KEYS).is_some())
        .map(|obj| to_article(obj, default_source))
        .take(MAX_ARTICLES)
        .collect()
}
