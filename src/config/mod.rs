//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{collections::HashSet, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::cache::CacheConfig;
use crate::infra::ReqwestTransport;

pub use cli::{CliArgs, Command, FetchArgs, FetchOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "hypercache";
const DEFAULT_BASE_URL: &str = "http://localhost:8080/server/api/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub transport: TransportSettings,
    pub cache: CacheConfig,
    pub types: Vec<TypeDeclaration>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Always ends with `/`, so relative hrefs join below it.
    pub base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

/// A resource type the binary registers, with the links it declares.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeDeclaration {
    pub name: String,
    #[serde(default)]
    pub time_to_live_ms: Option<u64>,
    #[serde(default)]
    pub links: Vec<LinkDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkDeclaration {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub list: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("HYPERCACHE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match &cli.command {
        Command::Fetch(args) => raw.apply_fetch_overrides(&args.overrides),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    transport: RawTransportSettings,
    cache: CacheConfig,
    types: Vec<TypeDeclaration>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTransportSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    user_agent: Option<String>,
}

impl RawSettings {
    fn apply_fetch_overrides(&mut self, overrides: &FetchOverrides) {
        if let Some(url) = overrides.base_url.as_ref() {
            self.transport.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.timeout_seconds {
            self.transport.timeout_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if overrides.no_embed {
            self.cache.embed_hints = false;
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            transport,
            cache,
            types,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let transport = build_transport_settings(transport)?;
        let cache = build_cache_settings(cache)?;
        let types = build_type_declarations(types)?;

        Ok(Self {
            logging,
            transport,
            cache,
            types,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_transport_settings(
    transport: RawTransportSettings,
) -> Result<TransportSettings, LoadError> {
    let raw_url = transport
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(DEFAULT_BASE_URL);
    let mut base_url = Url::parse(raw_url)
        .map_err(|err| LoadError::invalid("transport.base_url", format!("`{raw_url}`: {err}")))?;
    if base_url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "transport.base_url",
            format!("`{raw_url}` cannot be used as a base URL"),
        ));
    }
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }

    let timeout_seconds = transport.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "transport.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let user_agent = transport
        .user_agent
        .filter(|agent| !agent.trim().is_empty())
        .unwrap_or_else(|| ReqwestTransport::user_agent().to_string());

    Ok(TransportSettings {
        base_url,
        timeout: Duration::from_secs(timeout_seconds),
        user_agent,
    })
}

fn build_cache_settings(cache: CacheConfig) -> Result<CacheConfig, LoadError> {
    if cache.object_limit == 0 {
        return Err(LoadError::invalid(
            "cache.object_limit",
            "must be greater than zero",
        ));
    }
    if cache.patch_buffer_limit == 0 {
        return Err(LoadError::invalid(
            "cache.patch_buffer_limit",
            "must be greater than zero",
        ));
    }
    Ok(cache)
}

fn build_type_declarations(
    types: Vec<TypeDeclaration>,
) -> Result<Vec<TypeDeclaration>, LoadError> {
    let mut seen = HashSet::new();
    for declaration in &types {
        if declaration.name.trim().is_empty() {
            return Err(LoadError::invalid("types.name", "must not be empty"));
        }
        if !seen.insert(declaration.name.as_str()) {
            return Err(LoadError::invalid(
                "types.name",
                format!("`{}` is declared twice", declaration.name),
            ));
        }
    }
    Ok(types)
}
