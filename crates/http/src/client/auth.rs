//! Authentication API

use super::session::SessionState;
use super::{ClientError, TensorbinClient};
use reqwest::Method;
use tensorbin_core::validation::validate_credentials;
use tensorbin_core::{AuthTokens, Credentials, User};
use tracing::info;

/// Login, registration and session queries
#[derive(Debug, Clone)]
pub struct AuthService {
    client: TensorbinClient,
}

impl AuthService {
    /// Create a new auth service on top of a client's session
    pub const fn new(client: TensorbinClient) -> Self {
        Self { client }
    }

    /// Sign in and keep the issued tokens
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens, ClientError> {
        self.authenticate("/auth/login", email, password).await
    }

    /// Create an account and keep the issued tokens
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthTokens, ClientError> {
        self.authenticate("/auth/register", email, password).await
    }

    async fn authenticate(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthTokens, ClientError> {
        validate_credentials(email, password)?;

        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let tokens: AuthTokens = self
            .client
            .execute(|| Ok(self.client.request(Method::POST, path).json(&credentials)))
            .await?;

        self.client.session().store_tokens(&tokens)?;
        info!(path, "Signed in");
        Ok(tokens)
    }

    /// Fetch the signed-in user's profile
    pub async fn current_user(&self) -> Result<User, ClientError> {
        self.client
            .execute(|| Ok(self.client.request(Method::GET, "/auth/me")))
            .await
    }

    /// Forget the stored tokens.
    ///
    /// The backend is not told; the access token stays valid server-side
    /// until it expires.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.client.session().clear()?;
        info!("Signed out");
        Ok(())
    }

    /// Whether an access token is stored. Its validity is not checked.
    pub fn is_authenticated(&self) -> bool {
        self.client.session().access_token().is_some()
    }

    pub fn session_state(&self) -> SessionState {
        self.client.session().state()
    }
}
