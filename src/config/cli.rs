use crate::utils::error::ConfigError;
use crate::utils::validation::{validate_range, Validate};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Search,
    Object,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "docstore")]
#[command(about = "Inspect and edit documents in a search index or object bucket")]
pub struct CliConfig {
    #[arg(long, short, default_value = "docstore.toml")]
    pub config: PathBuf,

    #[arg(long, value_enum, default_value = "search")]
    pub backend: Backend,

    /// 請求逾時 (秒)，0 表示不設限
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print one document
    Get { key: String },
    /// Write a JSON document, replacing any existing one
    Put {
        key: String,
        /// Inline JSON; read from stdin when omitted
        #[arg(long)]
        data: Option<String>,
    },
    /// Merge a partial JSON document into an existing one
    Update {
        key: String,
        #[arg(long)]
        data: String,
        #[arg(long, default_value = "0")]
        resource_version: i64,
    },
    Delete { key: String },
    /// List documents under `/collection[/subcollection]`
    List {
        key: String,
        /// Keyword query, parsed as JSON when possible
        #[arg(long, short)]
        query: Option<String>,
        #[arg(long, default_value = "0")]
        from: usize,
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Page through everything with a scroll cursor
        #[arg(long)]
        scroll: bool,
        #[arg(long)]
        keys_only: bool,
        /// Source fields to leave out of each hit
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
    DeleteByQuery {
        key: String,
        #[arg(long, short)]
        query: Option<String>,
    },
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_range("timeout", self.timeout, 0, 3600)?;
        if let Command::List { limit, .. } = &self.command {
            validate_range("limit", *limit, 0, 10_000)?;
        }
        Ok(())
    }
}
