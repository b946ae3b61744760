//! TensorBin HTTP client
//!
//! Every backend call goes through [`TensorbinClient::send`]. It attaches
//! the stored access token as a bearer credential, and on a 401 it makes a
//! single attempt to renew the session with the refresh token and replay
//! the request. Everything else is handed back to the caller as a
//! [`ClientError`].

pub mod auth;
pub mod config;
pub mod error;
pub mod files;
pub mod session;
pub mod token_store;

use config::{ClientConfig, DEFAULT_USER_AGENT};
use error::ClientError;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use session::{Session, SessionEvent, SessionListener};
use std::sync::Arc;
use std::time::Duration;
use tensorbin_core::{AuthTokens, MAX_UPLOAD_BYTES};
use token_store::{MemoryTokenStore, TokenStore};
use tracing::{debug, info, warn};

/// Which send of a request is in progress
#[derive(Debug)]
enum Attempt {
    /// First send, with whatever access token is stored
    Initial,
    /// The one replay allowed after the session was renewed
    Replay { access_token: String },
}

impl Attempt {
    const fn label(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Replay { .. } => "replay",
        }
    }
}

/// Result of trying to renew the session after a 401
enum Refresh {
    /// A new access token to replay with
    Renewed(String),
    /// No refresh token is stored
    Unavailable,
    /// The refresh request itself failed; both tokens have been dropped
    Failed(ClientError),
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// TensorBin API client
#[derive(Clone)]
pub struct TensorbinClient {
    client: Client,
    base_url: String,
    session: Arc<Session>,
    max_upload_bytes: u64,
}

impl std::fmt::Debug for TensorbinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorbinClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl TensorbinClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> TensorbinClientBuilder {
        TensorbinClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session shared with every clone of this client
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub const fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a request builder without credentials.
    ///
    /// The bearer header is added by [`send`](Self::send), so builders handed
    /// to it should come from here.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Send a request through the authenticated pipeline.
    ///
    /// `build` is called once per send, so bodies that can't be cloned
    /// (streamed uploads) are rebuilt for the replay.
    pub async fn send<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn() -> Result<RequestBuilder, ClientError>,
    {
        let mut attempt = Attempt::Initial;

        loop {
            let access_token = match &attempt {
                Attempt::Initial => self.session.access_token(),
                Attempt::Replay { access_token } => Some(access_token.clone()),
            };

            let mut request = build()?;
            if let Some(token) = &access_token {
                request = request.bearer_auth(token);
            }
            let request = request.build()?;
            debug!(
                method = %request.method(),
                path = request.url().path(),
                attempt = attempt.label(),
                authenticated = access_token.is_some(),
                "Sending request"
            );

            let response = self.client.execute(request).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return check_status(response).await;
            }

            let error = ClientError::from_response(response).await;
            if let Attempt::Replay { .. } = attempt {
                warn!("Request refused again after refreshing the session");
                return Err(error);
            }

            match self.refresh(access_token.as_deref()).await {
                Refresh::Renewed(access_token) => attempt = Attempt::Replay { access_token },
                Refresh::Unavailable => {
                    self.session.invalidate(SessionEvent::LoginRequired);
                    return Err(error);
                }
                Refresh::Failed(refresh_error) => return Err(refresh_error),
            }
        }
    }

    /// Send a request and decode a JSON response
    pub async fn execute<T, F>(&self, build: F) -> Result<T, ClientError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn() -> Result<RequestBuilder, ClientError>,
    {
        let response = self.send(build).await?;
        Ok(response.json().await?)
    }

    /// Send a request and discard the response body
    pub async fn execute_unit<F>(&self, build: F) -> Result<(), ClientError>
    where
        F: Fn() -> Result<RequestBuilder, ClientError>,
    {
        self.send(build).await.map(drop)
    }

    /// Renew the session after a request sent with `sent_with` was refused.
    ///
    /// Refreshes are serialised. If another request renewed the session
    /// while this one waited, the stored access token no longer matches the
    /// one that was refused, and it is used without presenting the refresh
    /// token again.
    async fn refresh(&self, sent_with: Option<&str>) -> Refresh {
        let _gate = self.session.begin_refresh().await;

        if let Some(current) = self.session.access_token() {
            if sent_with != Some(current.as_str()) {
                debug!("Session was renewed by a concurrent request");
                return Refresh::Renewed(current);
            }
        }

        let Some(refresh_token) = self.session.refresh_token() else {
            return Refresh::Unavailable;
        };

        let renewed = match self.request_refresh(&refresh_token).await {
            Ok(tokens) => self.session.store_tokens(&tokens).map(|()| tokens),
            Err(err) => Err(err),
        };

        match renewed {
            Ok(tokens) => {
                info!("Session refreshed");
                Refresh::Renewed(tokens.access_token)
            }
            Err(err) => {
                warn!(error = %err, "Session refresh failed, signing out");
                if let Err(clear_err) = self.session.clear() {
                    warn!(error = %clear_err, "Failed to clear tokens");
                }
                self.session.invalidate(SessionEvent::RefreshFailed);
                Refresh::Failed(err)
            }
        }
    }

    /// Exchange a refresh token for a new pair, outside the pipeline
    async fn request_refresh(&self, refresh_token: &str) -> Result<AuthTokens, ClientError> {
        let response = self
            .request(Method::POST, "/auth/refresh")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ClientError::from_response(response).await)
    }
}

/// Builder for TensorbinClient
#[derive(Default)]
pub struct TensorbinClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    max_upload_bytes: Option<u64>,
    token_store: Option<Arc<dyn TokenStore>>,
    listener: Option<SessionListener>,
}

impl TensorbinClientBuilder {
    /// Start from a loaded configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::default()
            .base_url(config.api_url.clone())
            .max_upload_bytes(config.max_upload_bytes);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Override the local upload ceiling
    pub fn max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = Some(limit);
        self
    }

    /// Where tokens are kept (in memory if unset)
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Called when the user has to sign in again
    pub fn on_session_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<TensorbinClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        tensorbin_core::validation::validate_url(&base_url, "base_url")
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        );

        let client = client_builder.build()?;

        let store = self
            .token_store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let mut session = Session::new(store);
        if let Some(listener) = self.listener {
            session = session.with_listener(listener);
        }

        Ok(TensorbinClient {
            client,
            base_url,
            session: Arc::new(session),
            max_upload_bytes: self.max_upload_bytes.unwrap_or(MAX_UPLOAD_BYTES),
        })
    }
}
