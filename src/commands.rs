//! Subcommand implementations.
//!
//! Each function here backs one CLI subcommand. Results meant for the
//! operator are printed to stdout as JSON; progress goes to the tracing log.

use crate::api::NewsFetcher;
use crate::cli::{PromptAction, SourceAction, TopicAction};
use crate::db::{Database, NewsStore};
use crate::extract::extract_detailed;
use crate::models::Article;
use crate::outputs::json::{ArticleFeed, write_feed};
use crate::prompt::{build_prompt, enhance_for_json};
use crate::utils::take_chars;
use serde::Serialize;
use std::error::Error;
use tracing::{info, instrument, warn};
use url::Url;

/// Source used when trying out a prompt template.
pub const TEST_SOURCE: &str = "https://stackedhomes.com/";

/// Topic used when trying out a prompt template.
pub const TEST_TOPIC: &str = "HDB";

/// How many extracted articles a prompt test shows.
const SAMPLE_ARTICLES: usize = 2;

/// How much of the raw model answer a prompt test shows.
const RESPONSE_PREVIEW_CHARS: usize = 500;

/// Outcome of trying a prompt template once.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTestReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub articles_found: usize,
    pub sample_articles: Vec<Article>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fill `template` with the sample pair, ask the model, and extract.
///
/// A failed fetch is reported in the result rather than as an error.
#[instrument(level = "info", skip_all)]
pub async fn test_prompt<F: NewsFetcher>(fetcher: &F, template: &str) -> PromptTestReport {
    let prompt = enhance_for_json(&build_prompt(template, TEST_SOURCE, TEST_TOPIC));

    let response = match fetcher.fetch_news(&prompt).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Prompt test fetch failed");
            return PromptTestReport {
                success: false,
                message: "Prompt test failed during news fetching".to_string(),
                strategy: None,
                articles_found: 0,
                sample_articles: Vec::new(),
                original_response: None,
                error: Some(e.to_string()),
            };
        }
    };

    let extraction = extract_detailed(fetcher, &response, TEST_SOURCE, TEST_TOPIC).await;
    PromptTestReport {
        success: true,
        message: "Prompt test completed".to_string(),
        strategy: extraction.strategy.map(|s| s.name().to_string()),
        articles_found: extraction.articles.len(),
        sample_articles: extraction.articles.into_iter().take(SAMPLE_ARTICLES).collect(),
        original_response: Some(format!("{}...", take_chars(&response, RESPONSE_PREVIEW_CHARS))),
        error: None,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn not_found(what: &str, id: i64) -> Box<dyn Error> {
    format!("{} {} not found", what, id).into()
}

/// Trim an optional edit, rejecting values that are blank.
fn edited<'a>(field: &str, value: Option<&'a str>) -> Result<Option<&'a str>, Box<dyn Error>> {
    match value.map(str::trim) {
        Some("") => Err(format!("{} cannot be empty", field).into()),
        other => Ok(other),
    }
}

pub async fn last_run(db: &Database) -> Result<(), Box<dyn Error>> {
    let last = db.last_execution_time().await?;
    print_json(&serde_json::json!({ "lastExecution": last }))
}

/// Export every stored article to the dated JSON feed.
pub async fn export(db: &Database, json_output_dir: &str) -> Result<(), Box<dyn Error>> {
    let feed = ArticleFeed::new(db.list_articles().await?);
    let path = write_feed(&feed, json_output_dir).await?;
    info!(path = %path.display(), count = feed.count, "Export complete");
    Ok(())
}

pub async fn topics(db: &Database, action: TopicAction) -> Result<(), Box<dyn Error>> {
    match action {
        TopicAction::List => print_json(&db.list_topics().await?),
        TopicAction::Add { name, description } => {
            if name.trim().is_empty() {
                return Err("Topic name is required".into());
            }
            let id = db.create_topic(name.trim(), description.as_deref()).await?;
            info!(id, %name, "Topic created");
            print_json(&serde_json::json!({ "id": id }))
        }
        TopicAction::Update { id, name, description } => {
            let name = edited("Topic name", name.as_deref())?;
            if name.is_none() && description.is_none() {
                return Err("Nothing to update".into());
            }
            if !db.update_topic(id, name, description.as_deref()).await? {
                return Err(not_found("Topic", id));
            }
            info!(id, "Topic updated");
            Ok(())
        }
        TopicAction::Toggle { id } => {
            if !db.toggle_topic(id).await? {
                return Err(not_found("Topic", id));
            }
            info!(id, "Topic status toggled");
            Ok(())
        }
        TopicAction::Delete { id } => {
            if !db.delete_topic(id).await? {
                return Err(not_found("Topic", id));
            }
            info!(id, "Topic deleted");
            Ok(())
        }
    }
}

pub async fn sources(db: &Database, action: SourceAction) -> Result<(), Box<dyn Error>> {
    match action {
        SourceAction::List => print_json(&db.list_sources().await?),
        SourceAction::Add { name, url, description } => {
            if name.trim().is_empty() {
                return Err("Source name is required".into());
            }
            let parsed = Url::parse(&url).map_err(|e| format!("Invalid source URL '{}': {}", url, e))?;
            let id = db
                .create_source(name.trim(), parsed.as_str(), description.as_deref())
                .await?;
            info!(id, %name, url = %parsed, "Source created");
            print_json(&serde_json::json!({ "id": id }))
        }
        SourceAction::Update { id, name, url, description } => {
            let name = edited("Source name", name.as_deref())?;
            let url = url
                .map(|u| Url::parse(&u).map_err(|e| format!("Invalid source URL '{}': {}", u, e)))
                .transpose()?;
            if name.is_none() && url.is_none() && description.is_none() {
                return Err("Nothing to update".into());
            }
            let url = url.as_ref().map(Url::as_str);
            if !db.update_source(id, name, url, description.as_deref()).await? {
                return Err(not_found("Source", id));
            }
            info!(id, "Source updated");
            Ok(())
        }
        SourceAction::Toggle { id } => {
            if !db.toggle_source(id).await? {
                return Err(not_found("Source", id));
            }
            info!(id, "Source status toggled");
            Ok(())
        }
        SourceAction::Delete { id } => {
            if !db.delete_source(id).await? {
                return Err(not_found("Source", id));
            }
            info!(id, "Source deleted");
            Ok(())
        }
    }
}

pub async fn prompts(db: &Database, action: PromptAction) -> Result<(), Box<dyn Error>> {
    match action {
        PromptAction::List => print_json(&db.list_prompt_templates().await?),
        PromptAction::Add { name, template, description } => {
            if name.trim().is_empty() || template.trim().is_empty() {
                return Err("Name and template are required".into());
            }
            let id = db
                .create_prompt_template(name.trim(), &template, description.as_deref())
                .await?;
            info!(id, %name, "Prompt template created");
            print_json(&serde_json::json!({ "id": id }))
        }
        PromptAction::Update { id, name, template, description } => {
            let name = edited("Name", name.as_deref())?;
            if edited("Template", template.as_deref())?.is_none() && name.is_none() && description.is_none() {
                return Err("Nothing to update".into());
            }
            if !db
                .update_prompt_template(id, name, template.as_deref(), description.as_deref())
                .await?
            {
                return Err(not_found("Prompt template", id));
            }
            info!(id, "Prompt template updated");
            Ok(())
        }
        PromptAction::Active => print_json(&db.active_prompt_template().await?),
        PromptAction::Activate { id } => {
            if !db.activate_prompt_template(id).await? {
                return Err(not_found("Prompt template", id));
            }
            Ok(())
        }
        PromptAction::Delete { id } => {
            if !db.delete_prompt_template(id).await? {
                return Err(not_found("Prompt template", id));
            }
            info!(id, "Prompt template deleted");
            Ok(())
        }
    }
}
