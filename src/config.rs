use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

pub const APP_NAME: &str = "finchat";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const CHAT_PATH: &str = "/api/chat";
pub const CONVERSATIONS_PATH: &str = "/api/conversations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageMode {
    /// Conversations live in a local SQLite key-value table.
    Local,
    /// Conversations are proxied through the backend's REST API.
    Remote,
}

#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about = "Chat with the financial Q&A assistant")]
pub struct Cli {
    /// Base URL of the assistant backend.
    #[arg(long, env = "FINCHAT_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    #[arg(
        long,
        env = "FINCHAT_STORAGE",
        value_enum,
        default_value_t = StorageMode::Local,
        global = true
    )]
    pub storage: StorageMode,

    /// Path of the local database (conversations in local mode, settings always).
    #[arg(long, env = "FINCHAT_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Timeout for non-streaming REST requests.
    #[arg(long, env = "FINCHAT_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat (default).
    Chat {
        /// Resume an existing conversation.
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Ask a single question and print the answer.
    Ask {
        question: Vec<String>,
        #[arg(long)]
        conversation: Option<String>,
    },
    /// List conversations.
    List,
    /// Print a conversation's messages.
    Show { id: String },
    /// Create an empty conversation.
    New { title: Vec<String> },
    Rename { id: String, title: Vec<String> },
    Pin { id: String },
    Unpin { id: String },
    Delete { id: String },
    /// Delete every conversation.
    Clear,
    /// Export a conversation to Markdown.
    Export {
        id: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Show or change persisted settings.
    Settings {
        key: Option<String>,
        value: Option<String>,
    },
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: url::Url,
    pub storage: StorageMode,
    pub db_path: PathBuf,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let api_url = url::Url::parse(&cli.api_url)
            .with_context(|| format!("Invalid API URL: {}", cli.api_url))?;
        let db_path = match &cli.db {
            Some(path) => path.clone(),
            None => default_db_path()?,
        };
        Ok(Self {
            api_url,
            storage: cli.storage,
            db_path,
            request_timeout: Duration::from_secs(cli.timeout_secs.max(1)),
        })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let data_dir = match std::env::var("XDG_DATA_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let home = std::env::var("HOME").context("HOME not set")?;
            PathBuf::from(home).join(".local/share")
        }
    };
    Ok(data_dir.join(APP_NAME).join("finchat.db"))
}

/// Join a path onto the API base, keeping any path prefix the base carries.
pub fn endpoint(base: &url::Url, path: &str) -> String {
    format!("{}{}", base.as_str().trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let base = url::Url::parse("http://localhost:8000/").unwrap();
        assert_eq!(endpoint(&base, CHAT_PATH), "http://localhost:8000/api/chat");

        let prefixed = url::Url::parse("https://example.com/finance").unwrap();
        assert_eq!(
            endpoint(&prefixed, CONVERSATIONS_PATH),
            "https://example.com/finance/api/conversations"
        );
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["finchat", "--db", "/tmp/x.db", "list"]);
        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.storage, StorageMode::Local);
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert!(matches!(cli.command, Some(Command::List)));
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let cli = Cli::parse_from(["finchat", "--api-url", "not a url", "--db", "/tmp/x.db"]);
        assert!(Config::from_cli(&cli).is_err());
    }
}
