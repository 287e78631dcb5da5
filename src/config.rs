//! Configuration management for the miner
//!
//! Supports configuration via command line arguments, environment variables,
//! and configuration files (YAML/JSON) with validation and defaults.

use crate::consensus::{Network, NetworkKind};
use crate::miner::MinerOptions;
use crate::{Address, Error, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Nonce search workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerType {
    /// Single search thread on the blocking pool
    Local,
    /// Multi-threaded CPU search
    Cpu,
    /// External worker command (e.g., GPU miner)
    External,
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerType::Local => write!(f, "local"),
            WorkerType::Cpu => write!(f, "cpu"),
            WorkerType::External => write!(f, "external"),
        }
    }
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact single-line output
    Plain,
    /// Newline-delimited JSON
    Json,
    /// Multi-line human readable output
    Pretty,
}

/// Complete configuration for the miner
#[derive(Debug, Clone, PartialEq, Parser, Serialize, Deserialize)]
#[command(
    name = "pow-miner",
    version = env!("CARGO_PKG_VERSION"),
    about = "Proof-of-work CPU miner",
    long_about = "Mines blocks on an in-process chain using local, multi-threaded or external nonce search"
)]
pub struct Config {
    /// Print program info and exit
    #[arg(long)]
    #[serde(skip)]
    pub info: bool,

    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(skip)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Network parameters to mine with
    #[arg(short = 'n', long, default_value = "regtest", env = "POW_MINER_NETWORK")]
    #[serde(default = "default_network")]
    pub network: NetworkKind,

    /// Nonce search worker
    #[arg(short = 'w', long, default_value = "local")]
    #[serde(default = "default_worker")]
    pub worker: WorkerType,

    /// Number of search threads for the cpu worker (0 = all cores)
    #[arg(short = 'c', long, default_value = "0")]
    #[serde(default)]
    pub thread_count: usize,

    /// External worker command
    #[arg(long, default_value = "")]
    #[serde(default)]
    pub external_worker_cmd: String,

    /// Time limit for one external search window
    #[arg(long, default_value = "60s")]
    #[serde(default = "default_external_timeout")]
    pub external_timeout: String,

    /// Reward address written into the coinbase
    #[arg(short = 'a', long, env = "POW_MINER_ADDRESS")]
    pub address: Option<String>,

    /// Stop after mining this many blocks (0 = run until interrupted)
    #[arg(short = 'b', long, default_value = "0")]
    #[serde(default)]
    pub blocks: u64,

    /// Age after which a mempool change replaces the current job
    #[arg(long, default_value = "10s")]
    #[serde(default = "default_job_staleness")]
    pub job_staleness: String,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, default_value = "plain")]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Parse command line arguments and merge the config file if specified
    pub async fn load() -> Result<Self> {
        Self::resolve(Self::parse()).await
    }

    /// Like [`Config::load`] with explicit arguments
    pub async fn load_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config =
            Self::try_parse_from(args).map_err(|e| Error::config(format!("Invalid arguments: {}", e)))?;
        Self::resolve(config).await
    }

    async fn resolve(mut config: Self) -> Result<Self> {
        if let Some(config_file) = &config.config_file {
            let file_config = Self::load_from_file(config_file).await?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            // Default to YAML
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Merge CLI config with file config
    ///
    /// A command line value wins unless it is still the built-in default.
    fn merge_with_file(mut self, file: Self) -> Self {
        let defaults = Self::defaults();

        if self.network == defaults.network {
            self.network = file.network;
        }
        if self.worker == defaults.worker {
            self.worker = file.worker;
        }
        if self.thread_count == defaults.thread_count {
            self.thread_count = file.thread_count;
        }
        if self.external_worker_cmd == defaults.external_worker_cmd {
            self.external_worker_cmd = file.external_worker_cmd;
        }
        if self.external_timeout == defaults.external_timeout {
            self.external_timeout = file.external_timeout;
        }
        if self.address.is_none() {
            self.address = file.address;
        }
        if self.blocks == defaults.blocks {
            self.blocks = file.blocks;
        }
        if self.job_staleness == defaults.job_staleness {
            self.job_staleness = file.job_staleness;
        }
        if self.log_level == defaults.log_level {
            self.log_level = file.log_level;
        }
        if self.log_format == defaults.log_format {
            self.log_format = file.log_format;
        }
        if self.log_file.is_none() {
            self.log_file = file.log_file;
        }

        self
    }

    fn defaults() -> Self {
        Self {
            info: false,
            print_config: false,
            config_file: None,
            network: default_network(),
            worker: default_worker(),
            thread_count: 0,
            external_worker_cmd: String::new(),
            external_timeout: default_external_timeout(),
            address: None,
            blocks: 0,
            job_staleness: default_job_staleness(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_file: None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker == WorkerType::External && self.external_worker_cmd.trim().is_empty() {
            return Err(Error::config("The external worker requires --external-worker-cmd"));
        }

        if self.external_timeout_duration()?.is_zero() {
            return Err(Error::config("External timeout must be greater than 0"));
        }

        if self.job_staleness_duration()?.is_zero() {
            return Err(Error::config("Job staleness must be greater than 0"));
        }

        self.address()?;
        Ok(())
    }

    /// Network parameters
    pub fn network(&self) -> Network {
        Network::new(self.network)
    }

    /// Parsed reward address
    pub fn address(&self) -> Result<Option<Address>> {
        self.address.as_deref().map(Address::new).transpose()
    }

    /// Get external timeout duration
    pub fn external_timeout_duration(&self) -> Result<Duration> {
        parse_duration("external timeout", &self.external_timeout)
    }

    /// Get job staleness duration
    pub fn job_staleness_duration(&self) -> Result<Duration> {
        parse_duration("job staleness", &self.job_staleness)
    }

    /// Engine options derived from this configuration
    pub fn miner_options(&self) -> Result<MinerOptions> {
        Ok(MinerOptions {
            address: self.address()?,
            job_staleness: self.job_staleness_duration()?,
            ..MinerOptions::default()
        })
    }
}

fn parse_duration(name: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| Error::config(format!("Invalid {} '{}': {}", name, value, e)))
}

// Default value functions for serde
fn default_network() -> NetworkKind { NetworkKind::Regtest }
fn default_worker() -> WorkerType { WorkerType::Local }
fn default_external_timeout() -> String { "60s".to_string() }
fn default_job_staleness() -> String { "10s".to_string() }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_format() -> LogFormat { LogFormat::Plain }
