//! Command-line interface definitions for Property News.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Global options can be provided via command-line flags or environment variables.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Property News application.
///
/// # Examples
///
/// ```sh
/// # One ingestion run (what cron invokes daily)
/// property_news run
///
/// # Try a prompt template against the sample source and topic
/// property_news test-prompt --template "Search {source} for {topic} news"
///
/// # Manage what gets searched
/// property_news topics add Condo
/// property_news sources add EdgeProp https://www.edgeprop.sg/
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, env = "NEWS_CONFIG")]
    pub config: Option<String>,

    /// SQLite database path (overrides the config file)
    #[arg(short, long, env = "DATABASE_PATH")]
    pub database: Option<String>,

    /// Perplexity API key (overrides the config file)
    #[arg(long, env = "SONAR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search every active (topic, source) pair and store new articles
    Run,

    /// Run one prompt template against a sample source and topic
    TestPrompt {
        /// Template with {source} and {topic} placeholders
        #[arg(short, long)]
        template: String,
    },

    /// Print when the last ingestion run started
    LastRun,

    /// Write all stored articles to a dated JSON file
    Export {
        /// Output directory for the JSON file
        #[arg(short, long)]
        json_output_dir: String,
    },

    /// Manage search topics
    Topics {
        #[command(subcommand)]
        action: TopicAction,
    },

    /// Manage source sites
    Sources {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: PromptAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum TopicAction {
    List,
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a topic's name or description
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Flip a topic between active and inactive
    Toggle { id: i64 },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum SourceAction {
    List,
    Add {
        name: String,
        url: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a source's name, URL, or description
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Flip a source between active and inactive
    Toggle { id: i64 },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum PromptAction {
    List,
    Add {
        name: String,
        template: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a template's name, text, or description
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show the active template, if any
    Active,
    /// Make this template the only active one
    Activate { id: i64 },
    Delete { id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run() {
        let cli = Cli::parse_from(["property_news", "--database", "/tmp/news.db", "run"]);

        assert_eq!(cli.database.as_deref(), Some("/tmp/news.db"));
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn test_cli_test_prompt() {
        let cli = Cli::parse_from(["property_news", "test-prompt", "-t", "Search {source} for {topic}"]);

        match cli.command {
            Command::TestPrompt { template } => assert_eq!(template, "Search {source} for {topic}"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_export_short_flag() {
        let cli = Cli::parse_from(["property_news", "export", "-j", "/tmp/json"]);

        match cli.command {
            Command::Export { json_output_dir } => assert_eq!(json_output_dir, "/tmp/json"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_nested_actions() {
        let cli = Cli::parse_from([
            "property_news",
            "sources",
            "add",
            "EdgeProp",
            "https://www.edgeprop.sg/",
            "--description",
            "Listings and news",
        ]);
        match cli.command {
            Command::Sources {
                action: SourceAction::Add { name, url, description },
            } => {
                assert_eq!(name, "EdgeProp");
                assert_eq!(url, "https://www.edgeprop.sg/");
                assert_eq!(description.as_deref(), Some("Listings and news"));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from(["property_news", "prompts", "activate", "3"]);
        assert!(matches!(
            cli.command,
            Command::Prompts { action: PromptAction::Activate { id: 3 } }
        ));
    }

    #[test]
    fn test_cli_update_actions() {
        let cli = Cli::parse_from(["property_news", "topics", "update", "4", "--name", "Landed"]);
        match cli.command {
            Command::Topics {
                action: TopicAction::Update { id, name, description },
            } => {
                assert_eq!(id, 4);
                assert_eq!(name.as_deref(), Some("Landed"));
                assert_eq!(description, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from([
            "property_news",
            "prompts",
            "update",
            "2",
            "--template",
            "Search {source} for {topic}",
        ]);
        assert!(matches!(
            cli.command,
            Command::Prompts {
                action: PromptAction::Update { id: 2, name: None, template: Some(_), description: None }
            }
        ));

        let cli = Cli::parse_from(["property_news", "prompts", "active"]);
        assert!(matches!(cli.command, Command::Prompts { action: PromptAction::Active }));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["property_news"]).is_err());
    }
}
