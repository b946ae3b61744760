use serde::{Deserialize, Serialize};

use crate::validation::DEFAULT_PER_PAGE;

/// Server-assigned identifier of an uploaded file
pub type FileId = i64;

/// Login and registration request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Token pair issued by login, register and refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token lifetime in seconds, as reported by the server
    #[serde(default)]
    pub expires_in: u64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub tier: i32,
    pub storage_used: u64,
    pub storage_limit: u64,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: String,
}

impl User {
    /// Bytes still available under the user's quota
    pub const fn storage_remaining(&self) -> u64 {
        self.storage_limit.saturating_sub(self.storage_used)
    }
}

/// Processing state of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Metadata for one uploaded file, as last seen from the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub filename: String,
    pub original_filename: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub sha256: String,
    #[serde(default)]
    pub upload_status: UploadStatus,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl FileRecord {
    /// Name to show a user: the title if set, else the uploaded filename
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.original_filename)
    }
}

/// One page of a file listing or search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileList {
    pub files: Vec<FileRecord>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl FileList {
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Search filters plus the page to fetch.
///
/// Unset filters are left out of the request entirely. `page` and
/// `per_page` are always sent, so an empty query asks for the same page as a
/// plain listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: None,
            tags: Vec::new(),
            mime_type: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub const fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Same filters, different page
    #[must_use]
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    /// True when no filter is set
    pub fn is_unfiltered(&self) -> bool {
        non_blank(self.query.as_deref()).is_none()
            && self.tags.iter().all(|t| t.trim().is_empty())
            && non_blank(self.mime_type.as_deref()).is_none()
    }

    /// Encode as request parameters, omitting unset or blank filters
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(5);

        if let Some(query) = non_blank(self.query.as_deref()) {
            params.push(("query", query.to_string()));
        }

        let tags = join_tags(&self.tags);
        if !tags.is_empty() {
            params.push(("tags", tags));
        }

        if let Some(mime_type) = non_blank(self.mime_type.as_deref()) {
            params.push(("mime_type", mime_type.to_string()));
        }

        params.push(("page", self.page.to_string()));
        params.push(("per_page", self.per_page.to_string()));
        params
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Split a comma-separated tag string, trimming and dropping empty entries
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Join tags into the comma-separated form the backend expects
pub fn join_tags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}
