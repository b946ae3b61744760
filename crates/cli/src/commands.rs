//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use serde::Serialize;
use std::io::BufRead;
use std::path::PathBuf;
use tensorbin_core::{FileId, SearchQuery};
use tensorbin_http::client::files::parse_tags;
use tensorbin_http::{AuthService, FileService, SessionState, UploadSource};
use tracing::{debug, info};

use crate::output;

/// Services and settings shared by every command
pub struct App {
    pub auth: AuthService,
    pub files: FileService,
    pub per_page: u32,
    pub json: bool,
}

impl App {
    fn print<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", human());
        }
        Ok(())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and sign in
    Register {
        email: String,

        /// Read from stdin when not given
        #[arg(long, env = "TENSORBIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in
    Login {
        email: String,

        /// Read from stdin when not given
        #[arg(long, env = "TENSORBIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Show whether a session is stored
    Status,

    /// Upload one or more files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Comma-separated tags applied to every file
        #[arg(long)]
        tags: Option<String>,

        /// Title applied to every file
        #[arg(long)]
        title: Option<String>,
    },

    /// List your files
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Defaults to the configured page size
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Search your files
    Search {
        /// Free-text query
        #[arg(short, long)]
        query: Option<String>,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        mime_type: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Show a file's metadata
    Info { id: FileId },

    /// Delete a file
    Delete { id: FileId },

    /// Download a file
    Download {
        id: FileId,

        /// Target file or directory (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a file's direct download link
    Url { id: FileId },

    /// Save a file's preview image
    Thumbnail {
        id: FileId,

        #[arg(short, long)]
        output: PathBuf,
    },
}

impl Commands {
    pub async fn execute(self, app: &App) -> Result<()> {
        match self {
            Self::Register { email, password } => {
                let password = password_or_stdin(password)?;
                app.auth.register(&email, &password).await?;
                println!("Registered and signed in as {email}");
                Ok(())
            }
            Self::Login { email, password } => {
                let password = password_or_stdin(password)?;
                app.auth.login(&email, &password).await?;
                println!("Signed in as {email}");
                Ok(())
            }
            Self::Logout => {
                app.auth.logout()?;
                println!("Signed out");
                Ok(())
            }
            Self::Whoami => {
                let user = app.auth.current_user().await?;
                app.print(&user, || output::user_details(&user))
            }
            Self::Status => {
                let label = match app.auth.session_state() {
                    SessionState::Authenticated => "signed in",
                    SessionState::Refreshing => "refreshing session",
                    SessionState::Unauthenticated => "not signed in",
                };
                println!("{label}");
                Ok(())
            }
            Self::Upload { files, tags, title } => upload(app, files, tags, title).await,
            Self::List { page, per_page } => {
                let list = app
                    .files
                    .user_files(page, per_page.unwrap_or(app.per_page))
                    .await?;
                app.print(&list, || output::file_list(&list))
            }
            Self::Search {
                query,
                tags,
                mime_type,
                page,
                per_page,
            } => {
                let mut search = SearchQuery::new()
                    .tags(tags.as_deref().map(parse_tags).unwrap_or_default())
                    .page(page)
                    .per_page(per_page.unwrap_or(app.per_page));
                if let Some(query) = query {
                    search = search.query(query);
                }
                if let Some(mime_type) = mime_type {
                    search = search.mime_type(mime_type);
                }
                debug!(?search, "Running search");

                let list = app.files.search_files(&search).await?;
                app.print(&list, || output::file_list(&list))
            }
            Self::Info { id } => {
                let file = app.files.get_file(id).await?;
                app.print(&file, || output::file_details(&file))
            }
            Self::Delete { id } => {
                app.files.delete_file(id).await?;
                println!("Deleted file {id}");
                Ok(())
            }
            Self::Download { id, output: dest } => {
                let dest = dest.unwrap_or_else(|| PathBuf::from("."));
                let (path, bytes) = app.files.download_to(id, &dest).await?;
                let summary = serde_json::json!({ "path": path, "bytes": bytes });
                app.print(&summary, || {
                    format!(
                        "Saved {} ({})",
                        path.display(),
                        output::format_size(bytes)
                    )
                })
            }
            Self::Url { id } => {
                println!("{}", app.files.download_url(id));
                Ok(())
            }
            Self::Thumbnail { id, output: dest } => {
                let image = app.files.thumbnail(id).await?;
                tokio::fs::write(&dest, &image)
                    .await
                    .with_context(|| format!("Failed to write {}", dest.display()))?;
                println!("Saved {}", dest.display());
                Ok(())
            }
        }
    }
}

async fn upload(
    app: &App,
    files: Vec<PathBuf>,
    tags: Option<String>,
    title: Option<String>,
) -> Result<()> {
    let sources = files
        .into_iter()
        .map(UploadSource::from_path)
        .collect::<Result<Vec<_>, _>>()?;
    let tags = tags.as_deref().map(parse_tags).unwrap_or_default();
    info!(count = sources.len(), "Uploading files");

    let report = app.files.upload_batch(&sources, &tags, title.as_deref()).await;

    if app.json {
        let records: Vec<_> = report.successes().collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in report.successes() {
            println!("Uploaded {}", output::file_row(record));
        }
    }
    for (filename, err) in report.failures() {
        eprintln!("Failed {filename}: {err}");
    }

    if !report.is_complete_success() {
        let failed = report.failures().count();
        bail!("{failed} of {} uploads failed", report.len());
    }
    Ok(())
}

/// Use the given password or read one line from stdin
fn password_or_stdin(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password given");
    }
    Ok(password)
}
