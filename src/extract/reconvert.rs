//! Ask the model to reformat its own answer as strict JSON.
//!
//! Used when none of the local parsers found a JSON article list. The first
//! part of the original answer is sent back with instructions to re-emit it
//! as an array with the five canonical fields only.

use crate::api::NewsFetcher;
use crate::extract::array_pattern;
use crate::models::Article;
use crate::prompt::reconversion_prompt;
use crate::utils::truncate_for_log;
use std::error::Error;
use tracing::{debug, instrument};

/// Re-convert `response` through a second model call.
///
/// # Errors
///
/// Returns an error if the second call fails or its array does not parse.
#[instrument(level = "info", skip_all, fields(%source, %topic))]
pub async fn reconvert<F: NewsFetcher>(
    fetcher: &F,
    response: &str,
    source: &str,
    topic: &str,
) -> Result<Vec<Article>, Box<dyn Error>> {
    let prompt = reconversion_prompt(response, source, topic);
    let converted = fetcher.fetch_news(&prompt).await?;
    debug!(preview = %truncate_for_log(&converted, 300), "Received re-converted response");
    array_pattern(&converted, source)
}
