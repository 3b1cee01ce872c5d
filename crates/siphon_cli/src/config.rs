//! Configuration file support for siphon.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `SIPHON_`, e.g., `SIPHON_DATABASE_URL`)
//! 3. Config file (./siphon.toml, then ~/.config/siphon/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/siphon/siphon.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/siphon/siphon.db"  # optional, this is the default
//!
//! [youtube]
//! api_key = "AIza..."  # or use SIPHON_YOUTUBE_API_KEY env var
//!
//! [github]
//! token = "ghp_..."  # or use SIPHON_GITHUB_TOKEN env var
//!
//! [http]
//! timeout_secs = 30
//! user_agent = "siphon/0.1"
//!
//! [sync]
//! max_results = 200
//! concurrency = 4
//! requests_per_second = 5
//! max_retries = 3
//! no_rate_limit = false
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use siphon::adapter::{AdapterSettings, DEFAULT_USER_AGENT, RateLimit};
use siphon::retry::RetryConfig;
use siphon::sync::{DEFAULT_SYNC_CONCURRENCY, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// YouTube Data API configuration.
    pub youtube: YouTubeConfig,
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// Outbound HTTP settings shared by every adapter.
    pub http: HttpConfig,
    /// Default sync options.
    pub sync: SyncConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/siphon/siphon.db` if not specified.
    pub url: Option<String>,
}

/// YouTube configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// Data API v3 key. Required to sync YouTube sources.
    pub api_key: Option<String>,
}

/// GitHub configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via SIPHON_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
}

/// HTTP client settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Overrides the default `siphon/<version>` user agent.
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: None,
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Bound on payloads consumed per run; unset means unbounded.
    pub max_results: Option<NonZeroUsize>,
    /// Sources synced in parallel by `item sync-all`.
    pub concurrency: usize,
    /// Client-side request rate per platform.
    pub requests_per_second: u32,
    /// Retries for retryable upstream failures.
    pub max_retries: usize,
    /// Whether to disable proactive rate limiting.
    pub no_rate_limit: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_results: None,
            concurrency: DEFAULT_SYNC_CONCURRENCY,
            requests_per_second: 5,
            max_retries: 3,
            no_rate_limit: false,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/siphon/config.toml)
    /// 3. Local config file (./siphon.toml)
    /// 4. Environment variables with SIPHON_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(config_path) = Self::default_config_path()
            && config_path.exists()
        {
            tracing::debug!("Loading config from {:?}", config_path);
            builder = builder.add_source(
                File::from(config_path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("siphon.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./siphon.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., SIPHON_DATABASE_URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("SIPHON")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("siphon.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// Adapter settings for the default registry, with CLI overrides applied.
    pub fn adapter_settings(&self, no_rate_limit: bool) -> AdapterSettings {
        let rate_limit = if no_rate_limit || self.sync.no_rate_limit {
            RateLimit::Disabled
        } else {
            RateLimit::PerSecond(self.sync.requests_per_second.max(1))
        };

        AdapterSettings {
            youtube_api_key: self.youtube.api_key.clone(),
            github_token: self.github.token.clone(),
            user_agent: self
                .http
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout: Duration::from_secs(self.http.timeout_secs.max(1)),
            rate_limit,
            retry: RetryConfig::new(
                Duration::from_millis(INITIAL_BACKOFF_MS),
                Duration::from_millis(MAX_BACKOFF_MS),
                self.sync.max_retries,
            ),
        }
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "siphon").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/siphon` or `~/.local/state/siphon`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "siphon").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
