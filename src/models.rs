//! Data models for extracted and stored news articles.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Article`]: A candidate article produced by the extraction pipeline
//! - [`StoredArticle`]: An article row owned by the storage layer
//! - Configuration rows: [`Topic`], [`Source`], [`PromptTemplate`]
//!
//! Candidates only live for one ingestion iteration. They are either dropped
//! (duplicate or invalid) or converted into a [`StoredArticle`] row.

use serde::{Deserialize, Serialize};

/// A candidate news article extracted from a model response.
///
/// Every candidate leaving the extraction pipeline has all five fields
/// populated; missing values are replaced with defaults by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Article {
    /// The article headline. Never empty.
    pub title: String,
    /// A short summary of the article.
    pub description: String,
    /// Publication date as reported by the model, ISO-8601 preferred.
    pub date: String,
    /// The publisher or source site.
    pub source: String,
    /// The article URL; used as the de-duplication key.
    pub canonical_url: String,
}

/// An article persisted in the `news_articles` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoredArticle {
    /// Server-assigned row id.
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Publication date normalized to RFC 3339 at insert time.
    pub date_created: String,
    /// The topic this article was ingested under.
    pub topic: String,
    pub source: String,
    /// Unique canonical URL.
    pub unique_url: String,
}

/// A topic the ingestion run searches for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// A web source the ingestion run searches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub is_active: bool,
}

/// A prompt template with `{source}` and `{topic}` placeholders.
///
/// At most one template is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PromptTemplate {
    pub id: i64,
    pub name: String,
    pub template: String,
    pub description: Option<String>,
    pub is_active: bool,
}
