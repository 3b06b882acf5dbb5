//! Runtime configuration loaded from a YAML file.
//!
//! Every field has a default, so a missing config file yields a working
//! setup pointed at the Perplexity API with the built-in topics, sources, and
//! prompt. The built-in defaults are also what an ingestion run falls back to
//! when no topic, source, or prompt template is marked active in storage.
//!
//! ```yaml
//! api_base: https://api.perplexity.ai
//! model: sonar
//! database_path: ./data/property_news.db
//! default_topics: [HDB, Condo]
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument};

/// Topics searched when none are marked active.
pub const DEFAULT_TOPICS: [&str; 4] = ["HDB", "Condo", "Landed", "Finance"];

/// Sources searched when none are marked active.
pub const DEFAULT_SOURCES: [&str; 2] = ["https://stackedhomes.com/", "https://www.edgeprop.sg/"];

/// Prompt used when no template is marked active.
pub const DEFAULT_PROMPT: &str = r#"Search for the latest news from {source} about {topic} in Singapore from the last 3 days and Skip the articles which are paid. Return EXACTLY 10 news articles as a JSON array. Each article must be a JSON object with these exact fields: "title", "description", "date", "source", "canonical_url". Return ONLY the JSON array, no additional text or explanation. Example format: [{"title":"Article Title","description":"Article description","date":"2024-01-15","source":"Source Name","canonical_url":"https://example.com/article"}]"#;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NewsConfig {
    /// Base URL of the OpenAI-compatible chat completions API.
    pub api_base: String,
    /// API key; usually supplied through `SONAR_API_KEY` instead.
    pub api_key: Option<String>,
    pub model: String,
    /// System message sent with every request.
    pub system_prompt: String,
    /// Perplexity search mode (`web` or `academic`).
    pub search_mode: String,
    /// Path to the SQLite database file.
    pub database_path: String,
    pub default_topics: Vec<String>,
    pub default_sources: Vec<String>,
    pub default_prompt: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.perplexity.ai".to_string(),
            api_key: None,
            model: "sonar".to_string(),
            system_prompt: "Be precise and concise.".to_string(),
            search_mode: "web".to_string(),
            database_path: "property_news.db".to_string(),
            default_topics: DEFAULT_TOPICS.iter().map(|s| s.to_string()).collect(),
            default_sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            default_prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

/// Fallback topics, sources, and prompt handed to the ingestion driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestDefaults {
    pub topics: Vec<String>,
    pub sources: Vec<String>,
    pub prompt: String,
}

impl NewsConfig {
    /// Extract the fallback lists used by an ingestion run.
    pub fn ingest_defaults(&self) -> IngestDefaults {
        IngestDefaults {
            topics: self.default_topics.clone(),
            sources: self.default_sources.clone(),
            prompt: self.default_prompt.clone(),
        }
    }
}

/// Parse a configuration from YAML text.
pub fn parse_config(yaml: &str) -> Result<NewsConfig, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

/// Load the configuration file, or defaults when `path` is `None`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid YAML.
#[instrument(level = "info", skip_all, fields(path = ?path))]
pub async fn load_config(path: Option<&str>) -> Result<NewsConfig, Box<dyn Error>> {
    let Some(path) = path else {
        info!("No config file given; using built-in defaults");
        return Ok(NewsConfig::default());
    };

    if !Path::new(path).exists() {
        return Err(format!("Config file '{}' does not exist", path).into());
    }

    let yaml = tokio::fs::read_to_string(path).await?;
    let config = parse_config(&yaml)?;
    info!(model = %config.model, api_base = %config.api_base, "Loaded configuration");
    Ok(config)
}
