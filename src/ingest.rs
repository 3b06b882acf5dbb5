//! The ingestion run: search every (topic, source) pair and store new articles.
//!
//! A run is meant to be triggered unattended (daily, by cron). It works
//! through the pairs one at a time, so at most one request to the search API
//! is in flight. Nothing that goes wrong with one pair or one article stops
//! the run; partial completion is normal.
//!
//! # Retry Policy
//!
//! Failed pairs are not retried within a run. The next run asks again, and
//! articles already stored are recognised by canonical URL and skipped, so
//! rerunning after a crash or partial failure is always safe.

use crate::api::NewsFetcher;
use crate::config::IngestDefaults;
use crate::db::NewsStore;
use crate::extract::extract;
use crate::models::Article;
use crate::prompt::{build_prompt, enhance_for_json};
use chrono::Utc;
use itertools::Itertools;
use serde::Serialize;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Counters describing one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// (topic, source) pairs attempted.
    pub pairs: usize,
    /// Pairs skipped because the fetch failed or nothing was extracted.
    pub failed_pairs: usize,
    pub inserted: usize,
    /// Articles skipped because their canonical URL was already stored.
    pub duplicates: usize,
    /// Articles whose lookup or insert failed.
    pub article_failures: usize,
}

fn resolve_list(
    what: &str,
    loaded: Result<Vec<String>, Box<dyn Error>>,
    defaults: &[String],
) -> Vec<String> {
    match loaded {
        Ok(items) if !items.is_empty() => items,
        Ok(_) => {
            info!(what, "None marked active; using defaults");
            defaults.to_vec()
        }
        Err(e) => {
            warn!(what, error = %e, "Failed to load active entries; using defaults");
            defaults.to_vec()
        }
    }
}

/// Store the articles of one pair, skipping those already present.
async fn persist<S: NewsStore>(store: &S, articles: &[Article], topic: &str, report: &mut IngestReport) {
    for article in articles {
        let url = article.canonical_url.as_str();
        match store.article_exists(url).await {
            Ok(true) => {
                debug!(%url, "Skipping duplicate");
                report.duplicates += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                error!(%url, error = %e, "Duplicate check failed; skipping article");
                report.article_failures += 1;
                continue;
            }
        }

        match store.insert_article(article, topic).await {
            Ok(true) => report.inserted += 1,
            Ok(false) => {
                debug!(%url, "Stored concurrently; skipping duplicate");
                report.duplicates += 1;
            }
            Err(e) => {
                error!(%url, error = %e, "Insert failed; skipping article");
                report.article_failures += 1;
            }
        }
    }
}

/// Build, fetch, extract and persist for one (topic, source) pair.
///
/// # Errors
///
/// Returns an error if the fetch fails or no article could be extracted.
#[instrument(level = "info", skip_all, fields(%topic, %source))]
async fn ingest_pair<S: NewsStore, F: NewsFetcher>(
    store: &S,
    fetcher: &F,
    template: &str,
    topic: &str,
    source: &str,
    report: &mut IngestReport,
) -> Result<(), Box<dyn Error>> {
    let prompt = enhance_for_json(&build_prompt(template, source, topic));
    let response = fetcher.fetch_news(&prompt).await?;

    let articles = extract(fetcher, &response, source, topic).await;
    if articles.is_empty() {
        return Err(format!("No valid news articles extracted for {} - {}", source, topic).into());
    }

    let before = report.inserted;
    persist(store, &articles, topic, report).await;
    info!(
        extracted = articles.len(),
        inserted = report.inserted - before,
        "Pair processed"
    );
    Ok(())
}

/// Run one ingestion over every active (topic, source) pair.
///
/// The start time is recorded first, whatever happens afterwards. Empty or
/// unreadable topic/source/prompt configuration falls back to `defaults`.
#[instrument(level = "info", skip_all)]
pub async fn run_ingestion<S: NewsStore, F: NewsFetcher>(
    store: &S,
    fetcher: &F,
    defaults: &IngestDefaults,
) -> IngestReport {
    let t0 = Instant::now();
    if let Err(e) = store.record_last_execution_time(Utc::now()).await {
        error!(error = %e, "Failed to record last execution time");
    }

    let topics = resolve_list("topics", store.active_topics().await, &defaults.topics);
    let sources = resolve_list("sources", store.active_sources().await, &defaults.sources);

    let template = match store.active_prompt_template().await {
        Ok(Some(active)) => {
            info!(name = %active.name, "Using active prompt template");
            active.template
        }
        Ok(None) => {
            info!("No active prompt template; using default");
            defaults.prompt.clone()
        }
        Err(e) => {
            warn!(error = %e, "Failed to load active prompt template; using default");
            defaults.prompt.clone()
        }
    };

    info!(topics = topics.len(), sources = sources.len(), "Starting ingestion run");

    let mut report = IngestReport::default();
    for (topic, source) in topics.iter().cartesian_product(sources.iter()) {
        report.pairs += 1;
        if let Err(e) = ingest_pair(store, fetcher, &template, topic, source, &mut report).await {
            error!(%topic, %source, error = %e, "Pair failed; continuing");
            report.failed_pairs += 1;
        }
    }

    info!(
        elapsed_ms = t0.elapsed().as_millis(),
        pairs = report.pairs,
        failed_pairs = report.failed_pairs,
        inserted = report.inserted,
        duplicates = report.duplicates,
        article_failures = report.article_failures,
        "Ingestion run complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::PromptTemplate;
    use crate::testing::{FixedFetcher, ScriptedFetcher};
    use chrono::DateTime;
    use serde_json::json;

    fn defaults(topics: &[&str], sources: &[&str]) -> IngestDefaults {
        IngestDefaults {
            topics: topics.iter().map(|s| s.to_string()).collect(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            prompt: "Search {source} for {topic}".to_string(),
        }
    }

    fn array_response(urls: &[&str]) -> String {
        let items: Vec<_> = urls
            .iter()
            .map(|u| json!({ "title": format!("About {u}"), "canonical_url": u, "date": "2025-05-06" }))
            .collect();
        serde_json::to_string(&items).unwrap()
    }

    #[tokio::test]
    async fn test_second_run_inserts_nothing() {
        let db = Database::in_memory().await.unwrap();
        let fetcher = FixedFetcher(array_response(&["https://a.sg/1", "https://a.sg/2", "https://a.sg/3"]));
        let defaults = defaults(&["HDB"], &["https://x.com/"]);

        let first = run_ingestion(&db, &fetcher, &defaults).await;
        assert_eq!(first.inserted, 3);
        assert_eq!(first.duplicates, 0);

        let second = run_ingestion(&db, &fetcher, &defaults).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(db.list_articles().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_same_url_across_pairs_stored_once() {
        let db = Database::in_memory().await.unwrap();
        let fetcher = FixedFetcher(array_response(&["https://a.sg/1"]));

        let report = run_ingestion(&db, &fetcher, &defaults(&["HDB", "Condo"], &["https://x.com/"])).await;
        assert_eq!(report.pairs, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);

        let stored = db.list_articles().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].topic, "HDB");
    }

    #[tokio::test]
    async fn test_fetch_failure_does_not_stop_run() {
        let db = Database::in_memory().await.unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            Err("connection reset".to_string()),
            Ok(array_response(&["https://a.sg/condo"])),
        ]);

        let report = run_ingestion(&db, &fetcher, &defaults(&["HDB", "Condo"], &["https://x.com/"])).await;
        assert_eq!(report.pairs, 2);
        assert_eq!(report.failed_pairs, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(db.list_articles().await.unwrap()[0].topic, "Condo");
    }

    #[tokio::test]
    async fn test_empty_extraction_skips_pair() {
        let db = Database::in_memory().await.unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            Ok("No news today.".to_string()),
            // Re-conversion answer for the first pair.
            Ok("[]".to_string()),
            Ok(array_response(&["https://a.sg/2"])),
        ]);

        let report = run_ingestion(&db, &fetcher, &defaults(&["HDB"], &["https://x.com/", "https://y.com/"])).await;
        assert_eq!(report.failed_pairs, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(fetcher.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_defaults_used_when_nothing_active() {
        let db = Database::in_memory().await.unwrap();
        let fetcher = ScriptedFetcher::new(vec![]);

        let report = run_ingestion(&db, &fetcher, &defaults(&["HDB", "Condo"], &["https://x.com/"])).await;
        assert_eq!(report.pairs, 2);
        assert_eq!(report.failed_pairs, 2);

        let prompts = fetcher.prompts();
        assert!(prompts[0].starts_with("Search https://x.com/ for HDB"));
        assert!(prompts[0].contains("IMPORTANT: Return the response as a JSON array."));
        assert!(prompts[1].starts_with("Search https://x.com/ for Condo"));
    }

    #[tokio::test]
    async fn test_active_configuration_overrides_defaults() {
        let db = Database::in_memory().await.unwrap();
        db.create_topic("Landed", None).await.unwrap();
        db.create_source("S", "https://s.sg/", None).await.unwrap();
        let id = db
            .create_prompt_template("custom", "Find {topic} at {source}, ONLY json", None)
            .await
            .unwrap();
        db.activate_prompt_template(id).await.unwrap();

        let fetcher = ScriptedFetcher::new(vec![Ok(array_response(&["https://s.sg/1"]))]);
        let report = run_ingestion(&db, &fetcher, &defaults(&["HDB"], &["https://x.com/"])).await;

        assert_eq!(report.pairs, 1);
        assert_eq!(fetcher.prompts(), vec!["Find Landed at https://s.sg/, ONLY json"]);
        assert_eq!(db.list_articles().await.unwrap()[0].topic, "Landed");
    }

    #[tokio::test]
    async fn test_last_execution_recorded_even_if_all_pairs_fail() {
        let db = Database::in_memory().await.unwrap();
        let fetcher = ScriptedFetcher::new(vec![]);

        run_ingestion(&db, &fetcher, &defaults(&["HDB"], &["https://x.com/"])).await;

        let recorded = db.last_execution_time().await.unwrap().unwrap();
        assert!(DateTime::parse_from_rfc3339(&recorded).is_ok());
    }

    /// Delegates to a [`Database`] but refuses to insert one URL.
    struct FlakyStore {
        db: Database,
        poisoned_url: &'static str,
    }

    impl NewsStore for FlakyStore {
        async fn active_topics(&self) -> Result<Vec<String>, Box<dyn Error>> {
            self.db.active_topics().await
        }

        async fn active_sources(&self) -> Result<Vec<String>, Box<dyn Error>> {
            self.db.active_sources().await
        }

        async fn active_prompt_template(&self) -> Result<Option<PromptTemplate>, Box<dyn Error>> {
            Err("settings table unavailable".into())
        }

        async fn article_exists(&self, canonical_url: &str) -> Result<bool, Box<dyn Error>> {
            self.db.article_exists(canonical_url).await
        }

        async fn insert_article(&self, article: &Article, topic: &str) -> Result<bool, Box<dyn Error>> {
            if article.canonical_url == self.poisoned_url {
                return Err("constraint violation".into());
            }
            self.db.insert_article(article, topic).await
        }

        async fn record_last_execution_time(
            &self,
            _at: chrono::DateTime<Utc>,
        ) -> Result<(), Box<dyn Error>> {
            Err("read-only".into())
        }
    }

    #[tokio::test]
    async fn test_insert_failure_skips_only_that_article() {
        let store = FlakyStore {
            db: Database::in_memory().await.unwrap(),
            poisoned_url: "https://a.sg/2",
        };
        let fetcher = FixedFetcher(array_response(&["https://a.sg/1", "https://a.sg/2", "https://a.sg/3"]));

        let report = run_ingestion(&store, &fetcher, &defaults(&["HDB"], &["https://x.com/"])).await;
        assert_eq!(report.failed_pairs, 0);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.article_failures, 1);

        let urls: Vec<_> = store
            .db
            .list_articles()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.unique_url)
            .sorted()
            .collect();
        assert_eq!(urls, vec!["https://a.sg/1", "https://a.sg/3"]);
    }
}
