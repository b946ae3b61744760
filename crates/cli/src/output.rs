//! Human-readable rendering of API results

use tensorbin_core::{FileList, FileRecord, UploadStatus, User};

const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// Format a byte count with a binary unit, e.g. `1.5 GiB`
pub fn format_size(bytes: u64) -> String {
    let mut unit = 0;
    let mut whole = bytes;
    let mut rem = 0;
    while whole >= 1024 && unit < UNITS.len() - 1 {
        rem = whole % 1024;
        whole /= 1024;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        // one decimal, truncated
        format!("{whole}.{} {}", rem * 10 / 1024, UNITS[unit])
    }
}

const fn status_label(status: UploadStatus) -> &'static str {
    match status {
        UploadStatus::Pending => "pending",
        UploadStatus::Processing => "processing",
        UploadStatus::Completed => "completed",
        UploadStatus::Failed => "failed",
        UploadStatus::Unknown => "unknown",
    }
}

/// One line per file
pub fn file_row(file: &FileRecord) -> String {
    let mut row = format!(
        "{:>6}  {:>10}  {:<10}  {}",
        file.id,
        format_size(file.size_bytes),
        status_label(file.upload_status),
        file.display_name()
    );
    if !file.tags.is_empty() {
        row.push_str(&format!("  [{}]", file.tags.join(", ")));
    }
    if file.blocked {
        row.push_str("  (blocked)");
    }
    row
}

pub fn file_list(list: &FileList) -> String {
    let mut out = String::new();
    if list.files.is_empty() {
        out.push_str("No files found.\n");
    } else {
        out.push_str(&format!(
            "{:>6}  {:>10}  {:<10}  {}\n",
            "ID", "SIZE", "STATUS", "NAME"
        ));
        for file in &list.files {
            out.push_str(&file_row(file));
            out.push('\n');
        }
    }

    out.push_str(&format!(
        "Page {} of {} ({} files)",
        list.page,
        list.total_pages.max(1),
        list.total
    ));
    if list.has_next() {
        out.push_str(&format!(" - next: --page {}", list.page + 1));
    }
    out
}

pub fn file_details(file: &FileRecord) -> String {
    let mut lines = vec![
        format!("ID:            {}", file.id),
        format!("Name:          {}", file.original_filename),
    ];
    if let Some(title) = &file.title {
        lines.push(format!("Title:         {title}"));
    }
    lines.push(format!(
        "Size:          {} ({} bytes)",
        format_size(file.size_bytes),
        file.size_bytes
    ));
    lines.push(format!(
        "Type:          {}",
        file.mime_type.as_deref().unwrap_or("unknown")
    ));
    lines.push(format!("SHA-256:       {}", file.sha256));
    lines.push(format!("Status:        {}", status_label(file.upload_status)));
    lines.push(format!("Downloads:     {}", file.download_count));
    if !file.tags.is_empty() {
        lines.push(format!("Tags:          {}", file.tags.join(", ")));
    }
    if file.blocked {
        lines.push("Blocked:       yes".to_string());
    }
    lines.push(format!("Uploaded:      {}", file.created_at));
    lines.join("\n")
}

pub fn user_details(user: &User) -> String {
    [
        format!("Email:         {}", user.email),
        format!("ID:            {}", user.id),
        format!("Tier:          {}", user.tier),
        format!(
            "Storage:       {} of {} used",
            format_size(user.storage_used),
            format_size(user.storage_limit)
        ),
        format!("Verified:      {}", if user.is_verified { "yes" } else { "no" }),
        format!("Active:        {}", if user.is_active { "yes" } else { "no" }),
        format!("Member since:  {}", user.created_at),
    ]
    .join("\n")
}
