//! Request-scoped video uploads.
//!
//! An upload is streamed to `temp_dir/<uuid>.<ext>` and wrapped in a
//! [`scopeguard`] that deletes the file when dropped, whichever way the
//! request ends.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use scopeguard::ScopeGuard;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_upload;

const DEFAULT_EXTENSION: &str = "mp4";

/// A video saved to disk for the lifetime of one request.
#[derive(Debug)]
pub struct SavedUpload {
    pub path: PathBuf,
    /// Name supplied by the client, echoed back in reports.
    pub filename: String,
    pub size: u64,
}

/// Upload that removes its file on drop.
pub type UploadGuard = ScopeGuard<SavedUpload, fn(SavedUpload)>;

fn remove_upload(upload: SavedUpload) {
    match std::fs::remove_file(&upload.path) {
        Ok(()) => debug!(path = %upload.path.display(), "Removed upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %upload.path.display(), error = %e, "Failed to remove upload"),
    }
}

/// Extension of the client filename if it is a short alphanumeric token.
fn upload_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.bytes().all(|b| b.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Stream a multipart field into `dir` under a fresh uuid name.
pub async fn save_upload(dir: &Path, mut field: Field<'_>) -> ApiResult<UploadGuard> {
    let filename = field
        .file_name()
        .filter(|name| !name.is_empty())
        .unwrap_or("upload.mp4")
        .to_string();
    let path = dir.join(format!("{}.{}", Uuid::new_v4(), upload_extension(&filename)));

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create upload file: {e}")))?;

    let mut upload: UploadGuard = scopeguard::guard(
        SavedUpload {
            path,
            filename,
            size: 0,
        },
        remove_upload as fn(SavedUpload),
    );

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e.body_text())))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to write upload: {e}")))?;
        upload.size += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to write upload: {e}")))?;

    record_upload(upload.size);
    debug!(path = %upload.path.display(), bytes = upload.size, "Upload saved");
    Ok(upload)
}
