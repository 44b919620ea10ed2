use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the hypercache binary.
#[derive(Debug, Parser)]
#[command(name = "hypercache", version, about = "HAL hypermedia client with a local cache")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "HYPERCACHE_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Fetch a resource (or one page of a list) and print it with its followed links.
    Fetch(FetchArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FetchArgs {
    /// Href to fetch, absolute or relative to the base URL.
    #[arg(value_name = "HREF", value_hint = ValueHint::Url)]
    pub href: String,

    /// Follow a single-valued link of the fetched resource. Repeatable.
    #[arg(long = "follow", value_name = "LINK")]
    pub follow: Vec<String>,

    /// Follow a list-valued link of the fetched resource. Repeatable.
    #[arg(long = "follow-list", value_name = "LINK")]
    pub follow_list: Vec<String>,

    /// Treat HREF as a paginated list.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub list: bool,

    /// One-based page number (lists only).
    #[arg(long, value_name = "N")]
    pub page: Option<u32>,

    /// Page size (lists only).
    #[arg(long, value_name = "N")]
    pub size: Option<u32>,

    /// Always go to the network, even for fresh cached results.
    #[arg(long = "no-cache", action = clap::ArgAction::SetTrue)]
    pub no_cache: bool,

    #[command(flatten)]
    pub overrides: FetchOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct FetchOverrides {
    /// Override the API base URL.
    #[arg(long = "base-url", value_name = "URL", value_hint = ValueHint::Url)]
    pub base_url: Option<String>,

    /// Override the request timeout.
    #[arg(long = "timeout-seconds", value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Disable `embed=` hints on requests that follow links.
    #[arg(long = "no-embed", action = clap::ArgAction::SetTrue)]
    pub no_embed: bool,
}
