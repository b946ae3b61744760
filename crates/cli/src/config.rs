//! CLI configuration
//!
//! Layered lowest to highest: built-in defaults, the TOML config file,
//! `TENSORBIN_*` environment variables, then command-line flags (applied by
//! the caller).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tensorbin_core::validation::validate_url;
use tensorbin_core::{DEFAULT_PER_PAGE, MAX_PER_PAGE, MAX_UPLOAD_BYTES};
use tensorbin_http::ClientConfig;
use tensorbin_http::FileTokenStore;
use tensorbin_http::client::config::DEFAULT_API_URL;

/// Environment variable prefix, e.g. `TENSORBIN_API_URL`
pub const ENV_PREFIX: &str = "TENSORBIN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Backend base URL, including the API prefix
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds (unset or 0 = none)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Files larger than this are refused before upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Where the session tokens are kept
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// Default page size for `list` and `search`
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

const fn default_max_upload_bytes() -> u64 {
    MAX_UPLOAD_BYTES
}

const fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: None,
            max_upload_bytes: default_max_upload_bytes(),
            token_file: None,
            per_page: default_per_page(),
        }
    }
}

impl CliConfig {
    /// `<config_dir>/tensorbin/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tensorbin").join("config.toml"))
    }

    /// Load configuration from an explicit file, or the default location if
    /// it exists, with environment overrides on top
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        } else if let Some(default_path) = Self::default_path() {
            builder = builder.add_source(config::File::from(default_path).required(false));
        }

        let settings = builder
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read configuration")?;
        let config: Self = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Check values the backend would otherwise reject on every request
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.api_url, "api_url")?;
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            anyhow::bail!("per_page: must be between 1 and {MAX_PER_PAGE}");
        }
        Ok(())
    }

    /// Token file location, falling back to the working directory
    pub fn token_path(&self) -> PathBuf {
        self.token_file
            .clone()
            .or_else(FileTokenStore::default_path)
            .unwrap_or_else(|| PathBuf::from(".tensorbin-tokens.json"))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_url: self.api_url.clone(),
            timeout_secs: self.timeout_secs,
            user_agent: None,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}
