//! Persisted access and refresh credentials
//!
//! Each token is stored with its own expiry, fixed when it is written:
//! access tokens live for one day, refresh tokens for seven. Expiry is
//! enforced here, at read time, the way a cookie jar drops stale cookies.
//! Nothing upstream checks a token's age before sending it; an absent token
//! just means an unauthenticated request that the server will answer with
//! 401.

use super::ClientError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Days an access token is kept after it is stored
pub const ACCESS_TOKEN_DAYS: i64 = 1;

/// Days a refresh token is kept after it is stored
pub const REFRESH_TOKEN_DAYS: i64 = 7;

/// Which of the two credentials to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
        }
    }

    /// How long a token of this kind is kept
    pub fn lifetime(self) -> Duration {
        match self {
            Self::Access => Duration::days(ACCESS_TOKEN_DAYS),
            Self::Refresh => Duration::days(REFRESH_TOKEN_DAYS),
        }
    }
}

/// Storage for the credential pair
pub trait TokenStore: Send + Sync {
    /// Store a new pair, replacing whatever was there
    fn set(&self, access_token: &str, refresh_token: &str) -> Result<(), ClientError>;

    /// Read a token, or `None` if it was never stored or has expired
    fn get(&self, kind: TokenKind) -> Option<String>;

    /// Drop both tokens
    fn clear(&self) -> Result<(), ClientError>;
}

/// A token value and the moment it stops being returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn issue(kind: TokenKind, value: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at: now + kind.lifetime(),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenSlots {
    #[serde(default)]
    access_token: Option<StoredToken>,
    #[serde(default)]
    refresh_token: Option<StoredToken>,
}

impl TokenSlots {
    fn issue(access_token: &str, refresh_token: &str, now: DateTime<Utc>) -> Self {
        Self {
            access_token: Some(StoredToken::issue(TokenKind::Access, access_token, now)),
            refresh_token: Some(StoredToken::issue(TokenKind::Refresh, refresh_token, now)),
        }
    }

    fn slot(&self, kind: TokenKind) -> Option<&StoredToken> {
        match kind {
            TokenKind::Access => self.access_token.as_ref(),
            TokenKind::Refresh => self.refresh_token.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: TokenKind) -> &mut Option<StoredToken> {
        match kind {
            TokenKind::Access => &mut self.access_token,
            TokenKind::Refresh => &mut self.refresh_token,
        }
    }

    fn live(&self, kind: TokenKind, now: DateTime<Utc>) -> Option<String> {
        self.slot(kind)
            .filter(|token| token.is_live(now))
            .map(|token| token.value.clone())
    }
}

fn lock(slots: &Mutex<TokenSlots>) -> MutexGuard<'_, TokenSlots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-local token store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slots: Mutex<TokenSlots>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a token with an explicit expiry into one slot
    pub fn insert(&self, kind: TokenKind, token: StoredToken) {
        *lock(&self.slots).slot_mut(kind) = Some(token);
    }
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, access_token: &str, refresh_token: &str) -> Result<(), ClientError> {
        *lock(&self.slots) = TokenSlots::issue(access_token, refresh_token, Utc::now());
        Ok(())
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        lock(&self.slots).live(kind, Utc::now())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *lock(&self.slots) = TokenSlots::default();
        Ok(())
    }
}

/// Token store backed by a JSON file, so a session outlives the process.
///
/// The file is readable by its owner only. A missing or unreadable file is
/// treated as an empty store.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    slots: Mutex<TokenSlots>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any tokens already saved there
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let slots = load_slots(&path);
        Self {
            path,
            slots: Mutex::new(slots),
        }
    }

    /// `<data_dir>/tensorbin/tokens.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("tensorbin").join("tokens.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, slots: &TokenSlots) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::TokenStore(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let content = serde_json::to_vec_pretty(slots)?;
        let tmp_path = self.path.with_extension("json.tmp");
        write_private(&tmp_path, &content)
            .and_then(|()| std::fs::rename(&tmp_path, &self.path))
            .map_err(|e| {
                ClientError::TokenStore(format!("cannot write {}: {e}", self.path.display()))
            })?;

        debug!(path = %self.path.display(), "Saved tokens");
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn set(&self, access_token: &str, refresh_token: &str) -> Result<(), ClientError> {
        let mut slots = lock(&self.slots);
        let updated = TokenSlots::issue(access_token, refresh_token, Utc::now());
        self.persist(&updated)?;
        *slots = updated;
        Ok(())
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        lock(&self.slots).live(kind, Utc::now())
    }

    fn clear(&self) -> Result<(), ClientError> {
        let mut slots = lock(&self.slots);
        *slots = TokenSlots::default();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::TokenStore(format!(
                "cannot remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

fn load_slots(path: &Path) -> TokenSlots {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return TokenSlots::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read token file, starting signed out");
            return TokenSlots::default();
        }
    };

    serde_json::from_slice(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Ignoring malformed token file");
        TokenSlots::default()
    })
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}
