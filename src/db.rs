//! SQLite persistence for articles and ingestion configuration.
//!
//! This module owns the database schema and exposes two surfaces:
//! - [`NewsStore`]: the handful of reads and writes an ingestion run needs
//! - inherent [`Database`] methods for operator management of topics,
//!   sources, prompt templates, and for reading stored articles
//!
//! # Tables
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `news_articles` | Ingested articles, unique on `unique_url` |
//! | `topics` | Topics to search for, with an `is_active` flag |
//! | `sources` | Source sites to search, with an `is_active` flag |
//! | `prompt_templates` | Prompt templates; at most one active |
//! | `system_settings` | Key/value settings such as the last run time |

use crate::models::{Article, PromptTemplate, Source, StoredArticle, Topic};
use crate::utils::{normalize_date, now_iso};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    Pool, Row, Sqlite,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous},
};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument};

const LAST_RUN_KEY: &str = "last_news_fetch";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS news_articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        date_created TEXT NOT NULL,
        topic TEXT NOT NULL,
        source TEXT NOT NULL,
        unique_url TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_news_articles_topic ON news_articles (topic);

    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        description TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS prompt_templates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        template TEXT NOT NULL,
        description TEXT,
        is_active BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS system_settings (
        setting_key TEXT PRIMARY KEY,
        setting_value TEXT NOT NULL
    );
"#;

/// Storage operations used by an ingestion run.
pub trait NewsStore {
    /// Names of topics marked active; may be empty.
    async fn active_topics(&self) -> Result<Vec<String>, Box<dyn Error>>;

    /// URLs of sources marked active; may be empty.
    async fn active_sources(&self) -> Result<Vec<String>, Box<dyn Error>>;

    /// The active prompt template, if one is marked active.
    async fn active_prompt_template(&self) -> Result<Option<PromptTemplate>, Box<dyn Error>>;

    /// Whether an article with this canonical URL is already stored.
    async fn article_exists(&self, canonical_url: &str) -> Result<bool, Box<dyn Error>>;

    /// Store `article` under `topic`.
    ///
    /// Returns `false` when the canonical URL was already present; the
    /// existing row is left untouched.
    async fn insert_article(&self, article: &Article, topic: &str) -> Result<bool, Box<dyn Error>>;

    /// Record when an ingestion run started.
    async fn record_last_execution_time(&self, at: DateTime<Utc>) -> Result<(), Box<dyn Error>>;
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

fn topic_from_row(row: &SqliteRow) -> Topic {
    Topic {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        is_active: row.get("is_active"),
    }
}

fn source_from_row(row: &SqliteRow) -> Source {
    Source {
        id: row.get("id"),
        name: row.get("name"),
        url: row.get("url"),
        description: row.get("description"),
        is_active: row.get("is_active"),
    }
}

fn prompt_from_row(row: &SqliteRow) -> PromptTemplate {
    PromptTemplate {
        id: row.get("id"),
        name: row.get("name"),
        template: row.get("template"),
        description: row.get("description"),
        is_active: row.get("is_active"),
    }
}

impl Database {
    /// Open (creating if missing) the database file at `path`.
    #[instrument(level = "info", skip_all, fields(%path))]
    pub async fn connect(path: &str) -> Result<Self, sqlx::Error> {
        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        info!("Database pool created");

        let db = Database { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// A private in-memory database, kept alive on a single connection.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        use std::str::FromStr;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;

        let db = Database { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        info!("Tables ensured to exist");
        Ok(())
    }

    /// Every stored article, newest first.
    pub async fn list_articles(&self) -> Result<Vec<StoredArticle>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, title, description, date_created, topic, source, unique_url
             FROM news_articles ORDER BY date_created DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StoredArticle {
                id: row.get("id"),
                title: row.get("title"),
                description: row.get("description"),
                date_created: row.get("date_created"),
                topic: row.get("topic"),
                source: row.get("source"),
                unique_url: row.get("unique_url"),
            })
            .collect())
    }

    /// The start time of the most recent ingestion run, if any.
    pub async fn last_execution_time(&self) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT setting_value FROM system_settings WHERE setting_key = ?1")
            .bind(LAST_RUN_KEY)
            .fetch_optional(&self.pool)
            .await
    }

    // --- topics ---

    pub async fn list_topics(&self) -> Result<Vec<Topic>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, description, is_active FROM topics ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(topic_from_row).collect())
    }

    /// Add an active topic and return its id.
    pub async fn create_topic(&self, name: &str, description: Option<&str>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO topics (name, description, is_active, created_at) VALUES (?1, ?2, 1, ?3)",
        )
        .bind(name)
        .bind(description)
        .bind(now_iso())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Change a topic's name and/or description; `None` keeps the current value.
    ///
    /// Returns `false` if no such topic exists.
    pub async fn update_topic(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE topics SET name = COALESCE(?1, name), description = COALESCE(?2, description)
             WHERE id = ?3",
        )
        .bind(name)
        .bind(description)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip a topic's active flag. Returns `false` if no such topic exists.
    pub async fn toggle_topic(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE topics SET is_active = NOT is_active WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_topic(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- sources ---

    pub async fn list_sources(&self) -> Result<Vec<Source>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, url, description, is_active FROM sources ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(source_from_row).collect())
    }

    /// Add an active source and return its id.
    pub async fn create_source(
        &self,
        name: &str,
        url: &str,
        description: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO sources (name, url, description, is_active, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
        )
        .bind(name)
        .bind(url)
        .bind(description)
        .bind(now_iso())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Change any of a source's name, URL, or description.
    ///
    /// Returns `false` if no such source exists.
    pub async fn update_source(
        &self,
        id: i64,
        name: Option<&str>,
        url: Option<&str>,
        description: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sources
             SET name = COALESCE(?1, name), url = COALESCE(?2, url), description = COALESCE(?3, description)
             WHERE id = ?4",
        )
        .bind(name)
        .bind(url)
        .bind(description)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip a source's active flag. Returns `false` if no such source exists.
    pub async fn toggle_source(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sources SET is_active = NOT is_active WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_source(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- prompt templates ---

    pub async fn list_prompt_templates(&self) -> Result<Vec<PromptTemplate>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, template, description, is_active FROM prompt_templates
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(prompt_from_row).collect())
    }

    /// Add an inactive prompt template and return its id.
    pub async fn create_prompt_template(
        &self,
        name: &str,
        template: &str,
        description: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO prompt_templates (name, template, description, is_active, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
        )
        .bind(name)
        .bind(template)
        .bind(description)
        .bind(now_iso())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Make `id` the only active template.
    ///
    /// Returns `false`, leaving the current active template in place, if no
    /// template has that id.
    #[instrument(level = "info", skip(self))]
    pub async fn activate_prompt_template(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM prompt_templates WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE prompt_templates SET is_active = 0")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE prompt_templates SET is_active = 1 WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Prompt template activated");
        Ok(true)
    }

    pub async fn update_prompt_template(
        &self,
        id: i64,
        name: Option<&str>,
        template: Option<&str>,
        description: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE prompt_templates
             SET name = COALESCE(?1, name), template = COALESCE(?2, template),
                 description = COALESCE(?3, description)
             WHERE id = ?4",
        )
        .bind(name)
        .bind(template)
        .bind(description)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_prompt_template(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM prompt_templates WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl NewsStore for Database {
    async fn active_topics(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let names = sqlx::query_scalar("SELECT name FROM topics WHERE is_active = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn active_sources(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let urls = sqlx::query_scalar("SELECT url FROM sources WHERE is_active = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(urls)
    }

    async fn active_prompt_template(&self) -> Result<Option<PromptTemplate>, Box<dyn Error>> {
        let row = sqlx::query(
            "SELECT id, name, template, description, is_active FROM prompt_templates
             WHERE is_active = 1 LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(prompt_from_row))
    }

    async fn article_exists(&self, canonical_url: &str) -> Result<bool, Box<dyn Error>> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM news_articles WHERE unique_url = ?1 LIMIT 1")
                .bind(canonical_url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn insert_article(&self, article: &Article, topic: &str) -> Result<bool, Box<dyn Error>> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO news_articles (title, description, date_created, topic, source, unique_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(unique_url) DO NOTHING
            "#,
        )
        .bind(&article.title)
        .bind(&article.description)
        .bind(normalize_date(&article.date, now))
        .bind(topic)
        .bind(&article.source)
        .bind(&article.canonical_url)
        .bind(now.to_rfc3339_opts(SecondsFormat::Millis, true))
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        debug!(url = %article.canonical_url, inserted, "Article insert");
        Ok(inserted)
    }

    async fn record_last_execution_time(&self, at: DateTime<Utc>) -> Result<(), Box<dyn Error>> {
        sqlx::query(
            r#"
            INSERT INTO system_settings (setting_key, setting_value) VALUES (?1, ?2)
            ON CONFLICT(setting_key) DO UPDATE SET setting_value = excluded.setting_value
            "#,
        )
        .bind(LAST_RUN_KEY)
        .bind(at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::Path;

    fn article(url: &str) -> Article {
        Article {
            title: "Resale flats".to_string(),
            description: "Prices up".to_string(),
            date: "2025-05-06".to_string(),
            source: "EdgeProp".to_string(),
            canonical_url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_exists() {
        let db = Database::in_memory().await.unwrap();
        assert!(!db.article_exists("https://a.sg/1").await.unwrap());

        assert!(db.insert_article(&article("https://a.sg/1"), "HDB").await.unwrap());
        assert!(db.article_exists("https://a.sg/1").await.unwrap());

        let stored = db.list_articles().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].topic, "HDB");
        assert_eq!(stored[0].unique_url, "https://a.sg/1");
        assert_eq!(stored[0].date_created, "2025-05-06T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_skipped_not_updated() {
        let db = Database::in_memory().await.unwrap();
        db.insert_article(&article("https://a.sg/1"), "HDB").await.unwrap();

        let mut changed = article("https://a.sg/1");
        changed.title = "Changed".to_string();
        assert!(!db.insert_article(&changed, "Condo").await.unwrap());

        let stored = db.list_articles().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "Resale flats");
        assert_eq!(stored[0].topic, "HDB");
    }

    #[tokio::test]
    async fn test_last_execution_time_overwrites() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.last_execution_time().await.unwrap(), None);

        let first = Utc.with_ymd_and_hms(2025, 5, 6, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 5, 7, 0, 0, 0).unwrap();
        db.record_last_execution_time(first).await.unwrap();
        db.record_last_execution_time(second).await.unwrap();

        assert_eq!(
            db.last_execution_time().await.unwrap().as_deref(),
            Some("2025-05-07T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn test_active_topics_and_sources() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.active_topics().await.unwrap().is_empty());

        let hdb = db.create_topic("HDB", None).await.unwrap();
        db.create_topic("Condo", Some("Private condos")).await.unwrap();
        assert!(db.toggle_topic(hdb).await.unwrap());
        assert_eq!(db.active_topics().await.unwrap(), vec!["Condo"]);
        assert!(!db.toggle_topic(999).await.unwrap());

        db.create_source("Stacked", "https://stackedhomes.com/", None).await.unwrap();
        assert_eq!(db.active_sources().await.unwrap(), vec!["https://stackedhomes.com/"]);

        let topics = db.list_topics().await.unwrap();
        assert_eq!(topics.len(), 2);
        assert!(topics.iter().any(|t| t.name == "HDB" && !t.is_active));
    }

    #[tokio::test]
    async fn test_single_active_prompt_template() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.active_prompt_template().await.unwrap(), None);

        let a = db.create_prompt_template("a", "A {topic}", None).await.unwrap();
        let b = db.create_prompt_template("b", "B {topic}", None).await.unwrap();
        assert_eq!(db.active_prompt_template().await.unwrap(), None);

        assert!(db.activate_prompt_template(a).await.unwrap());
        assert!(db.activate_prompt_template(b).await.unwrap());
        let active = db.active_prompt_template().await.unwrap().unwrap();
        assert_eq!(active.id, b);
        assert_eq!(active.template, "B {topic}");

        assert!(!db.activate_prompt_template(999).await.unwrap());
        assert_eq!(db.active_prompt_template().await.unwrap().unwrap().id, b);

        let all = db.list_prompt_templates().await.unwrap();
        assert_eq!(all.iter().filter(|p| p.is_active).count(), 1);
    }

    #[tokio::test]
    async fn test_delete_rows() {
        let db = Database::in_memory().await.unwrap();
        let id = db.create_source("Edge", "https://www.edgeprop.sg/", None).await.unwrap();
        assert!(db.delete_source(id).await.unwrap());
        assert!(!db.delete_source(id).await.unwrap());

        let id = db.create_topic("Landed", None).await.unwrap();
        assert!(db.delete_topic(id).await.unwrap());

        let id = db.create_prompt_template("p", "t", None).await.unwrap();
        assert!(db.delete_prompt_template(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_rows() {
        let db = Database::in_memory().await.unwrap();

        let id = db.create_topic("Landed", Some("Houses")).await.unwrap();
        assert!(db.update_topic(id, Some("Landed homes"), None).await.unwrap());
        let topic = &db.list_topics().await.unwrap()[0];
        assert_eq!(topic.name, "Landed homes");
        assert_eq!(topic.description.as_deref(), Some("Houses"));
        assert!(!db.update_topic(999, Some("x"), None).await.unwrap());

        let id = db.create_source("Edge", "https://www.edgeprop.sg/", None).await.unwrap();
        assert!(db
            .update_source(id, None, Some("https://www.edgeprop.sg/news"), Some("News"))
            .await
            .unwrap());
        let source = &db.list_sources().await.unwrap()[0];
        assert_eq!(source.name, "Edge");
        assert_eq!(source.url, "https://www.edgeprop.sg/news");
        assert_eq!(source.description.as_deref(), Some("News"));
        assert!(!db.update_source(999, Some("x"), None, None).await.unwrap());

        let id = db.create_prompt_template("p", "t", None).await.unwrap();
        assert!(db
            .update_prompt_template(id, None, Some("Search {source} for {topic}"), None)
            .await
            .unwrap());
        let prompt = &db.list_prompt_templates().await.unwrap()[0];
        assert_eq!(prompt.name, "p");
        assert_eq!(prompt.template, "Search {source} for {topic}");
        assert!(!db.update_prompt_template(999, None, Some("t"), None).await.unwrap());
    }

    #[test]
    fn test_connect_options_keep_special_characters_in_path() {
        let options = SqliteConnectOptions::new().filename("/tmp/news?v=1#a.db");
        assert_eq!(options.get_filename(), Path::new("/tmp/news?v=1#a.db"));
    }
}
