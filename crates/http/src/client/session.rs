//! Session context shared by the request pipeline and the services
//!
//! The session owns the token store, the gate that serialises refresh
//! attempts, and the listener the host application registers to hear that
//! the user has to sign in again.

use super::ClientError;
use super::token_store::{MemoryTokenStore, TokenKind, TokenStore};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tensorbin_core::AuthTokens;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Where the session stands right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable access token
    Unauthenticated,
    /// An access token is stored
    Authenticated,
    /// A refresh request is in flight
    Refreshing,
}

/// Emitted when the session can't be recovered without the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A request was refused and there is no refresh token to try
    LoginRequired,
    /// The refresh token was refused; both tokens have been dropped
    RefreshFailed,
}

/// Callback invoked with every [`SessionEvent`]
pub type SessionListener = Arc<dyn Fn(SessionEvent) + Send + Sync>;

pub struct Session {
    store: Arc<dyn TokenStore>,
    refresh_gate: Mutex<()>,
    refreshing: AtomicBool,
    listener: Option<SessionListener>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("has_listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            refresh_gate: Mutex::new(()),
            refreshing: AtomicBool::new(false),
            listener: None,
        }
    }

    /// Register the callback that hears about unrecoverable sessions
    #[must_use]
    pub fn with_listener(mut self, listener: SessionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn state(&self) -> SessionState {
        if self.refreshing.load(Ordering::Acquire) {
            SessionState::Refreshing
        } else if self.access_token().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.get(TokenKind::Access)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(TokenKind::Refresh)
    }

    /// Store a freshly issued token pair
    pub fn store_tokens(&self, tokens: &AuthTokens) -> Result<(), ClientError> {
        self.store.set(&tokens.access_token, &tokens.refresh_token)
    }

    /// Forget both tokens
    pub fn clear(&self) -> Result<(), ClientError> {
        self.store.clear()
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Tell the host the user has to sign in again
    pub(crate) fn invalidate(&self, event: SessionEvent) {
        warn!(?event, "Session invalidated");
        if let Some(listener) = &self.listener {
            listener(event);
        }
    }

    /// Wait for exclusive use of the refresh token
    pub(crate) async fn begin_refresh(&self) -> RefreshGuard<'_> {
        let guard = self.refresh_gate.lock().await;
        self.refreshing.store(true, Ordering::Release);
        RefreshGuard {
            _guard: guard,
            refreshing: &self.refreshing,
        }
    }
}

/// Held for the duration of one refresh attempt
pub(crate) struct RefreshGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    refreshing: &'a AtomicBool,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.refreshing.store(false, Ordering::Release);
    }
}
