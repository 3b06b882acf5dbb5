//! # Property News
//!
//! Ingests property news by prompting an LLM search API (Perplexity Sonar)
//! for each configured (topic, source) pair, extracting structured articles
//! from the free-text answer, and storing new ones in SQLite.
//!
//! ## Usage
//!
//! ```sh
//! SONAR_API_KEY=... property_news run
//! property_news test-prompt -t "Search {source} for {topic} news"
//! property_news export -j ./json
//! ```
//!
//! ## Architecture
//!
//! 1. **Configuration**: Active topics, sources, and prompt come from the
//!    database, falling back to built-in defaults
//! 2. **Fetching**: One search request per pair, sequentially
//! 3. **Extraction**: Five strategies tried in order until one yields articles
//! 4. **Storage**: New articles are inserted, keyed by canonical URL

use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod commands;
mod config;
mod db;
mod extract;
mod ingest;
mod models;
mod outputs;
mod prompt;
#[cfg(test)]
mod testing;
mod utils;

use api::SonarClient;
use cli::{Cli, Command};
use db::Database;
use utils::ensure_parent_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("property_news starting up");

    let args = Cli::parse();
    debug!(?args.command, ?args.config, "Parsed CLI arguments");

    let mut config = config::load_config(args.config.as_deref()).await?;
    if let Some(path) = args.database {
        config.database_path = path;
    }
    if let Some(key) = args.api_key {
        config.api_key = Some(key);
    }

    ensure_parent_dir(&config.database_path).await?;
    let db = Database::connect(&config.database_path).await?;
    info!(path = %config.database_path, "Database ready");

    match args.command {
        Command::Run => {
            let client = SonarClient::new(&config)?;
            let report = ingest::run_ingestion(&db, &client, &config.ingest_defaults()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::TestPrompt { template } => {
            let client = SonarClient::new(&config)?;
            let report = commands::test_prompt(&client, &template).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::LastRun => commands::last_run(&db).await?,
        Command::Export { json_output_dir } => commands::export(&db, &json_output_dir).await?,
        Command::Topics { action } => commands::topics(&db, action).await?,
        Command::Sources { action } => commands::sources(&db, action).await?,
        Command::Prompts { action } => commands::prompts(&db, action).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
