//! File API: upload, listing, search, lookup, delete and download

use super::{ClientError, TensorbinClient};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, Response, header};
use std::path::{Path, PathBuf};
use tensorbin_core::validation::{validate_pagination, validate_upload_size};
use tensorbin_core::{FileId, FileList, FileRecord, SearchQuery};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

pub use tensorbin_core::types::{join_tags, parse_tags};

/// A named payload to upload
#[derive(Debug, Clone)]
pub struct UploadSource {
    filename: String,
    body: UploadBody,
}

#[derive(Debug, Clone)]
enum UploadBody {
    Bytes(Bytes),
    /// Streamed from disk, reopened for every send
    Path(PathBuf),
}

impl UploadSource {
    /// Upload an in-memory buffer under `filename`
    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            body: UploadBody::Bytes(bytes.into()),
        }
    }

    /// Upload a file from disk, named after its last path component
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ClientError::Validation(tensorbin_core::ValidationError::invalid(
                    "file",
                    format!("{} has no usable file name", path.display()),
                ))
            })?
            .to_string();
        Ok(Self {
            filename,
            body: UploadBody::Path(path),
        })
    }

    /// Upload under a different name
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size of the payload in bytes
    pub fn size(&self) -> Result<u64, ClientError> {
        match &self.body {
            UploadBody::Bytes(bytes) => Ok(bytes.len() as u64),
            UploadBody::Path(path) => Ok(std::fs::metadata(path)?.len()),
        }
    }

    fn mime_type(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    /// Build the multipart part for one send
    fn part(&self) -> Result<Part, ClientError> {
        let part = match &self.body {
            UploadBody::Bytes(bytes) => {
                Part::stream_with_length(Body::from(bytes.clone()), bytes.len() as u64)
            }
            UploadBody::Path(path) => {
                let file = std::fs::File::open(path)?;
                let length = file.metadata()?.len();
                let stream = ReaderStream::new(tokio::fs::File::from_std(file));
                Part::stream_with_length(Body::wrap_stream(stream), length)
            }
        };
        Ok(part
            .file_name(self.filename.clone())
            .mime_str(&self.mime_type())?)
    }
}

/// Outcome of one file in a batch upload
#[derive(Debug)]
pub struct UploadOutcome {
    pub filename: String,
    pub result: Result<FileRecord, ClientError>,
}

/// Per-file results of a batch upload, in submission order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<UploadOutcome>,
}

impl BatchReport {
    pub fn successes(&self) -> impl Iterator<Item = &FileRecord> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Failed files with the reason each one failed
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ClientError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.filename.as_str(), e)))
    }

    pub fn is_complete_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// A downloaded file held in memory
#[derive(Debug, Clone)]
pub struct Download {
    /// Name suggested by the server, if any
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// File operations for the signed-in user
#[derive(Debug, Clone)]
pub struct FileService {
    client: TensorbinClient,
}

impl FileService {
    /// Create a new file service on top of a client's session
    pub const fn new(client: TensorbinClient) -> Self {
        Self { client }
    }

    /// Upload one file with optional tags and title.
    ///
    /// Files over the upload ceiling are refused here, before anything is
    /// sent. The server enforces the same limit.
    pub async fn upload_file(
        &self,
        source: &UploadSource,
        tags: &[String],
        title: Option<&str>,
    ) -> Result<FileRecord, ClientError> {
        let size = source.size()?;
        validate_upload_size(source.filename(), size, self.client.max_upload_bytes())?;

        let tags = join_tags(tags);
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        info!(filename = source.filename(), size, "Uploading file");

        let record: FileRecord = self
            .client
            .execute(|| {
                let mut form = Form::new().part("file", source.part()?);
                if !tags.is_empty() {
                    form = form.text("tags", tags.clone());
                }
                if let Some(title) = title {
                    form = form.text("title", title.to_string());
                }
                Ok(self
                    .client
                    .request(Method::POST, "/files/upload")
                    .multipart(form))
            })
            .await?;

        info!(id = record.id, filename = source.filename(), "Upload complete");
        Ok(record)
    }

    /// Upload several files one after another.
    ///
    /// Each file is attempted on its own; a failure is recorded in the report
    /// and the remaining files are still sent.
    pub async fn upload_batch(
        &self,
        sources: &[UploadSource],
        tags: &[String],
        title: Option<&str>,
    ) -> BatchReport {
        let mut report = BatchReport {
            outcomes: Vec::with_capacity(sources.len()),
        };

        for source in sources {
            let result = self.upload_file(source, tags, title).await;
            if let Err(err) = &result {
                warn!(filename = source.filename(), error = %err, "Upload failed");
            }
            report.outcomes.push(UploadOutcome {
                filename: source.filename().to_string(),
                result,
            });
        }

        report
    }

    /// List the signed-in user's files, `page` counting from 1
    pub async fn user_files(&self, page: u32, per_page: u32) -> Result<FileList, ClientError> {
        validate_pagination(page, per_page)?;
        let params = [("page", page), ("per_page", per_page)];
        self.client
            .execute(|| Ok(self.client.request(Method::GET, "/files/").query(&params)))
            .await
    }

    /// Search files; unset filters are left out of the request
    pub async fn search_files(&self, query: &SearchQuery) -> Result<FileList, ClientError> {
        validate_pagination(query.page, query.per_page)?;
        let params = query.to_params();
        debug!(?params, "Searching files");
        self.client
            .execute(|| {
                Ok(self
                    .client
                    .request(Method::GET, "/files/search")
                    .query(&params))
            })
            .await
    }

    pub async fn get_file(&self, id: FileId) -> Result<FileRecord, ClientError> {
        let path = format!("/files/{id}");
        self.client
            .execute(|| Ok(self.client.request(Method::GET, &path)))
            .await
    }

    pub async fn delete_file(&self, id: FileId) -> Result<(), ClientError> {
        let path = format!("/files/{id}");
        self.client
            .execute_unit(|| Ok(self.client.request(Method::DELETE, &path)))
            .await?;
        info!(id, "Deleted file");
        Ok(())
    }

    /// Direct download link. Nothing is sent and no credential is attached,
    /// so following it only works if the server allows anonymous download.
    pub fn download_url(&self, id: FileId) -> String {
        self.client.url(&format!("/files/{id}/download"))
    }

    /// Fetch a file's content with the session's credentials
    pub async fn download_file(&self, id: FileId) -> Result<Download, ClientError> {
        let response = self.fetch_content(id).await?;
        let filename = attachment_filename(&response);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let bytes = response.bytes().await?;

        Ok(Download {
            filename,
            content_type,
            bytes,
        })
    }

    /// Stream a file's content to disk and return the bytes written.
    ///
    /// When `dest` is a directory the server-suggested filename is used
    /// inside it, falling back to `file-<id>`. Returns the final path.
    pub async fn download_to(&self, id: FileId, dest: &Path) -> Result<(PathBuf, u64), ClientError> {
        let mut response = self.fetch_content(id).await?;

        let target = if dest.is_dir() {
            let name = attachment_filename(&response).unwrap_or_else(|| format!("file-{id}"));
            dest.join(name)
        } else {
            dest.to_path_buf()
        };

        let mut file = tokio::fs::File::create(&target).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(id, path = %target.display(), bytes = written, "Downloaded file");
        Ok((target, written))
    }

    /// Fetch a file's preview image
    pub async fn thumbnail(&self, id: FileId) -> Result<Bytes, ClientError> {
        let path = format!("/files/{id}/thumbnail");
        let response = self
            .client
            .send(|| Ok(self.client.request(Method::GET, &path)))
            .await?;
        Ok(response.bytes().await?)
    }

    async fn fetch_content(&self, id: FileId) -> Result<Response, ClientError> {
        let path = format!("/files/{id}/download");
        self.client
            .send(|| Ok(self.client.request(Method::GET, &path)))
            .await
    }
}

/// Filename from a `Content-Disposition: attachment; filename="..."` header,
/// reduced to its last path component
fn attachment_filename(response: &Response) -> Option<String> {
    let value = response
        .headers()
        .get(header::CONTENT_DISPOSITION)?
        .to_str()
        .ok()?;
    disposition_filename(value)
}

fn disposition_filename(value: &str) -> Option<String> {
    let raw = value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename="))?;
    let name = raw.trim_matches('"');
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(ToString::to_string)
}
