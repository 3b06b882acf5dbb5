//! LLM search API interaction.
//!
//! This module provides the interface the ingestion pipeline uses to ask the
//! news search model a question, plus a concrete client for Perplexity's
//! OpenAI-compatible chat completions endpoint.
//!
//! # Architecture
//!
//! - [`NewsFetcher`]: Core trait defining async "prompt in, text out" interaction
//! - [`SonarClient`]: `reqwest`-backed implementation talking to `/chat/completions`
//!
//! # Retry Policy
//!
//! There is none. A failed request fails the current (topic, source) pair
//! only; the next scheduled run retries it, and canonical-URL de-duplication
//! makes the rerun safe.

use crate::config::NewsConfig;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Trait for async news search interaction.
///
/// Implementors send a prompt to a search-capable model and return its raw
/// answer. No format is guaranteed: the text may be JSON, markdown, prose,
/// or empty.
pub trait NewsFetcher {
    /// Send `prompt` to the model and receive its answer.
    async fn fetch_news(&self, prompt: &str) -> Result<String, Box<dyn Error>>;
}

/// Client for Perplexity's `sonar` models.
pub struct SonarClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    system_prompt: String,
    search_mode: String,
}

impl fmt::Debug for SonarClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SonarClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("search_mode", &self.search_mode)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    search_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl SonarClient {
    /// Create a client from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured.
    pub fn new(config: &NewsConfig) -> Result<Self, Box<dyn Error>> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or("No API key configured (set SONAR_API_KEY or api_key in the config file)")?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            search_mode: config.search_mode.clone(),
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            search_mode: &self.search_mode,
        }
    }
}

impl NewsFetcher for SonarClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn fetch_news(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        debug!(prompt_chars = prompt.chars().count(), "Sending search request");

        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match res {
            Ok(r) => r,
            Err(e) => {
                warn!(elapsed_ms = t0.elapsed().as_millis(), error = %e, "API call failed");
                return Err(e.into());
            }
        };

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or("API response contained no message content")?;

        info!(
            elapsed_ms = t0.elapsed().as_millis(),
            response_chars = content.chars().count(),
            "Search request succeeded"
        );
        Ok(content)
    }
}
