//! Gateway configuration management
//!
//! Handles loading configuration from environment variables, TOML files, and CLI arguments.
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 8080
//! log_level = "info"
//! log_format = "json"
//!
//! [engine]
//! simulations = 10000
//! run_interval_secs = 300
//!
//! [feeds]
//! max_deviation_pct = 2.0
//! ```

use adapter_feeds::FeedsConfig;
use pricer_forecast::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FORECAST_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port number: {0}. Must be between 1 and 65535")]
    InvalidPort(u16),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: text, json")]
    InvalidLogFormat(String),

    #[error("Invalid environment: {0}. Must be one of: development, staging, production")]
    InvalidEnvironment(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Configuration file error: {0}")]
    FileError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),

    #[error(transparent)]
    Engine(#[from] pricer_forecast::config::ConfigError),

    #[error(transparent)]
    Feeds(#[from] adapter_feeds::FeedError),
}

/// Log levels supported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Convert log level to tracing filter string
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidLogFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Environment types for configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidEnvironment(s.to_string())),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Gateway configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Log level
    #[serde(deserialize_with = "deserialize_from_str")]
    pub log_level: LogLevel,
    /// Log output format
    #[serde(deserialize_with = "deserialize_from_str")]
    pub log_format: LogFormat,
    /// Environment (development, staging, production)
    #[serde(deserialize_with = "deserialize_from_str")]
    pub environment: Environment,
    /// Seconds to wait for open connections after a shutdown signal
    pub shutdown_timeout_secs: u64,
    /// Simulation engine settings
    pub engine: EngineConfig,
    /// Price feed settings
    pub feeds: FeedsConfig,
}

fn deserialize_from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr<Err = ConfigError>,
{
    let s = String::deserialize(deserializer)?;
    T::from_str(&s).map_err(serde::de::Error::custom)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
            environment: Environment::Development,
            shutdown_timeout_secs: 30,
            engine: EngineConfig::default(),
            feeds: FeedsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `FORECAST_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary variable lookup
    ///
    /// Keys are looked up with the [`ENV_PREFIX`] prepended. Unset variables
    /// leave the current value untouched.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(host) = var("HOST") {
            self.host = host;
        }
        if let Some(port) = var("PORT") {
            self.port = parse_env("PORT", &port)?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = LogLevel::from_str(&level)?;
        }
        if let Some(format) = var("LOG_FORMAT") {
            self.log_format = LogFormat::from_str(&format)?;
        }
        if let Some(env) = var("ENV") {
            self.environment = Environment::from_str(&env)?;
        }
        if let Some(timeout) = var("SHUTDOWN_TIMEOUT_SECS") {
            self.shutdown_timeout_secs = parse_env("SHUTDOWN_TIMEOUT_SECS", &timeout)?;
        }

        // Engine
        if let Some(dir) = var("DATA_DIR") {
            self.engine.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = var("VOLATILITY_PCT") {
            self.engine.volatility_pct = parse_env("VOLATILITY_PCT", &v)?;
        }
        if let Some(v) = var("HORIZON_DAYS") {
            self.engine.horizon_days = parse_env("HORIZON_DAYS", &v)?;
        }
        if let Some(v) = var("SIMULATIONS") {
            self.engine.simulations = parse_env("SIMULATIONS", &v)?;
        }
        if let Some(v) = var("WORKERS") {
            self.engine.workers = parse_env("WORKERS", &v)?;
        }
        if let Some(v) = var("MAX_SIMULATIONS") {
            self.engine.max_simulations = parse_env("MAX_SIMULATIONS", &v)?;
        }
        if let Some(v) = var("MAX_WORKERS") {
            self.engine.max_workers = parse_env("MAX_WORKERS", &v)?;
        }
        if let Some(v) = var("RUN_INTERVAL_SECS") {
            self.engine.run_interval_secs = parse_env("RUN_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = var("BATCH_SIZE") {
            self.engine.batch_size = parse_env("BATCH_SIZE", &v)?;
        }
        if let Some(v) = var("SEED") {
            self.engine.seed = Some(parse_env("SEED", &v)?);
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        self.engine.validate()?;
        self.feeds.validate()?;
        Ok(())
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(log_level) = &cli.log_level {
            self.log_level = LogLevel::from_str(log_level)?;
        }
        if let Some(log_format) = &cli.log_format {
            self.log_format = LogFormat::from_str(log_format)?;
        }
        if let Some(dir) = &cli.data_dir {
            self.engine.data_dir = dir.clone();
        }
        if let Some(workers) = cli.workers {
            self.engine.workers = workers;
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvError(format!("{}{}={:?} is not valid", ENV_PREFIX, name, value)))
}

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Host address override
    pub host: Option<String>,
    /// Port override
    pub port: Option<u16>,
    /// Log level override
    pub log_level: Option<String>,
    /// Log format override
    pub log_format: Option<String>,
    /// Run log directory override
    pub data_dir: Option<PathBuf>,
    /// Worker count override
    pub workers: Option<usize>,
}

/// Build configuration from all sources
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
pub fn build_config(cli: &CliArgs) -> Result<ServerConfig, ConfigError> {
    let mut config = if let Some(config_path) = &cli.config_file {
        ServerConfig::from_file(config_path)?
    } else {
        ServerConfig::default()
    };

    config.apply_env()?;
    config.merge_with_cli(cli)?;
    config.validate()?;

    Ok(config)
}
