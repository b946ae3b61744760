//! TensorBin core types and validation rules

pub mod error;
pub mod types;
pub mod validation;

pub use error::ValidationError;
pub use types::{
    AuthTokens, Credentials, FileId, FileList, FileRecord, SearchQuery, UploadStatus, User,
};
pub use validation::{DEFAULT_PER_PAGE, MAX_PER_PAGE, MAX_UPLOAD_BYTES, MIN_PASSWORD_LEN};
