//! Turning a free-text model answer into a bounded list of articles.
//!
//! The model is asked for a JSON array but answers however it likes: bare
//! JSON, JSON wrapped in prose or markdown fences, loose objects, numbered
//! lists, or plain sentences with links. Extraction therefore runs an ordered
//! chain of [`Strategy`]s, each more lossy than the one before, and keeps the
//! output of the first that yields at least one valid article.
//!
//! | # | Strategy | Input | Network |
//! |---|----------|-------|---------|
//! | 1 | [`Strategy::ArrayPattern`] | first `[ {...} ]` substring | no |
//! | 2 | [`Strategy::ObjectScan`] | every single-level `{...}` | no |
//! | 3 | [`Strategy::WholeResponse`] | whole text as JSON | no |
//! | 4 | [`Strategy::AiReconversion`] | model re-formats its answer | yes |
//! | 5 | [`Strategy::Heuristic`] | text layouts, then bare URLs | no |
//!
//! A failing strategy is logged and the next one runs; extraction itself
//! never fails.

pub mod heuristic;
pub mod normalize;
pub mod reconvert;

use crate::api::NewsFetcher;
use crate::models::Article;
use crate::utils::{looks_truncated, truncate_for_log};
use normalize::{has_title, normalize};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

/// First bracketed array of objects, lazily closed at the first `}` + `]`.
static ARRAY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").unwrap());

/// An object with at most one level of nested braces.
static OBJECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").unwrap());

/// One extraction technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ArrayPattern,
    ObjectScan,
    WholeResponse,
    AiReconversion,
    Heuristic,
}

impl Strategy {
    /// The order strategies are attempted in.
    pub const ORDER: [Strategy; 5] = [
        Strategy::ArrayPattern,
        Strategy::ObjectScan,
        Strategy::WholeResponse,
        Strategy::AiReconversion,
        Strategy::Heuristic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::ArrayPattern => "array_pattern",
            Strategy::ObjectScan => "object_scan",
            Strategy::WholeResponse => "whole_response",
            Strategy::AiReconversion => "ai_reconversion",
            Strategy::Heuristic => "heuristic",
        }
    }

    async fn attempt<F: NewsFetcher>(
        self,
        fetcher: &F,
        response: &str,
        source: &str,
        topic: &str,
    ) -> Result<Vec<Article>, Box<dyn Error>> {
        match self {
            Strategy::ArrayPattern => array_pattern(response, source),
            Strategy::ObjectScan => Ok(object_scan(response, source)),
            Strategy::WholeResponse => whole_response(response, source),
            Strategy::AiReconversion => {
                reconvert::reconvert(fetcher, response, source, topic).await
            }
            Strategy::Heuristic => Ok(heuristic::extract_with_patterns(response, source, topic)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The outcome of running the strategy chain over one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The strategy whose output was used, if any produced articles.
    pub strategy: Option<Strategy>,
    pub articles: Vec<Article>,
}

/// Parse the first `[ {...} ]` substring of `text`.
///
/// No match, or a match that is not a non-empty array, yields no articles.
///
/// # Errors
///
/// Returns the JSON error if the matched substring does not parse.
pub fn array_pattern(text: &str, source: &str) -> Result<Vec<Article>, Box<dyn Error>> {
    let Some(m) = ARRAY_PATTERN.find(text) else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Value>(m.as_str())? {
        Value::Array(items) if !items.is_empty() => Ok(normalize(&items, source)),
        _ => Ok(Vec::new()),
    }
}

/// Collect every parseable single-level object that has a title.
pub fn object_scan(text: &str, source: &str) -> Vec<Article> {
    let objects: Vec<Value> = OBJECT_PATTERN
        .find_iter(text)
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .filter(has_title)
        .collect();

    debug!(count = objects.len(), "Titled objects found by scan");
    normalize(&objects, source)
}

/// Parse the whole response as JSON: an array, or an object with `articles`.
///
/// # Errors
///
/// Returns the JSON error if the response is not valid JSON.
pub fn whole_response(text: &str, source: &str) -> Result<Vec<Article>, Box<dyn Error>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => Ok(normalize(&items, source)),
        Value::Object(obj) => match obj.get("articles") {
            Some(Value::Array(items)) => Ok(normalize(items, source)),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

fn log_strategy_error(strategy: Strategy, e: &(dyn Error + 'static)) {
    match e.downcast_ref::<serde_json::Error>() {
        Some(json_err) if looks_truncated(json_err) => {
            warn!(%strategy, error = %e, "Strategy failed; JSON looks truncated")
        }
        _ => warn!(%strategy, error = %e, "Strategy failed"),
    }
}

/// Run the strategy chain and report which strategy succeeded.
#[instrument(level = "info", skip_all, fields(%source, %topic))]
pub async fn extract_detailed<F: NewsFetcher>(
    fetcher: &F,
    response: &str,
    source: &str,
    topic: &str,
) -> Extraction {
    for strategy in Strategy::ORDER {
        match strategy.attempt(fetcher, response, source, topic).await {
            Ok(articles) if !articles.is_empty() => {
                info!(%strategy, count = articles.len(), "Extracted articles");
                return Extraction {
                    strategy: Some(strategy),
                    articles,
                };
            }
            Ok(_) => debug!(%strategy, "Strategy produced no articles"),
            Err(e) => log_strategy_error(strategy, e.as_ref()),
        }
    }

    error!(
        response_preview = %truncate_for_log(response, 300),
        "All extraction strategies failed"
    );
    Extraction {
        strategy: None,
        articles: Vec::new(),
    }
}

/// Extract at most ten articles from a raw model `response`.
///
/// `fetcher` is only used by the re-conversion strategy.
pub async fn extract<F: NewsFetcher>(
    fetcher: &F,
    response: &str,
    source: &str,
    topic: &str,
) -> Vec<Article> {
    extract_detailed(fetcher, response, source, topic)
        .await
        .articles
}
