//! TensorBin HTTP client
//!
//! A typed client for the TensorBin file-hosting API. One
//! [`TensorbinClient`] owns the session (stored tokens, refresh state and the
//! sign-in-required listener); [`AuthService`] and [`FileService`] are thin
//! wrappers that share it.

pub mod client;

pub use client::auth::AuthService;
pub use client::config::ClientConfig;
pub use client::error::ClientError;
pub use client::files::{BatchReport, Download, FileService, UploadOutcome, UploadSource};
pub use client::session::{Session, SessionEvent, SessionState};
pub use client::token_store::{FileTokenStore, MemoryTokenStore, TokenKind, TokenStore};
pub use client::{TensorbinClient, TensorbinClientBuilder};

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
