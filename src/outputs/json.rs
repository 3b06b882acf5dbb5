//! JSON export of stored articles.
//!
//! The feed is what the operator dashboard reads: every stored article,
//! newest first, wrapped with the export time and a count.

use crate::models::StoredArticle;
use crate::utils::now_iso;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// The exported article feed.
#[derive(Debug, Deserialize, Serialize)]
pub struct ArticleFeed {
    /// When the export was written, RFC 3339 UTC.
    pub generated_at: String,
    pub count: usize,
    pub articles: Vec<StoredArticle>,
}

impl ArticleFeed {
    pub fn new(articles: Vec<StoredArticle>) -> Self {
        Self {
            generated_at: now_iso(),
            count: articles.len(),
            articles,
        }
    }
}

/// Write `feed` to `{json_output_dir}/{local date}/articles.json`.
///
/// Creates the dated directory if needed and returns the written path.
///
/// # Errors
///
/// Returns an error if directory creation, serialization, or the write fails.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_feed(feed: &ArticleFeed, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(feed)?;

    let local_date = Local::now().date_naive().to_string();
    let full_json_dir = Path::new(json_output_dir).join(&local_date);

    info!(dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let output_json_filename = full_json_dir.join("articles.json");
    fs::write(&output_json_filename, json).await?;
    info!(path = %output_json_filename.display(), count = feed.count, "Wrote article feed");

    Ok(output_json_filename)
}
