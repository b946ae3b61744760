//! Client connection settings

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tensorbin_core::MAX_UPLOAD_BYTES;

/// Base URL used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// User agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("tensorbin-client/", env!("CARGO_PKG_VERSION"));

/// Settings for building a [`TensorbinClient`](super::TensorbinClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, including the API prefix
    pub api_url: String,

    /// Transport-level request timeout in seconds (none by default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Files larger than this are refused before upload
    pub max_upload_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: None,
            user_agent: None,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
