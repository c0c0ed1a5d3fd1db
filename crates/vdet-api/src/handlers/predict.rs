//! Inference and annotated-video handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use tokio_util::io::ReaderStream;
use tracing::info;
use vdet_inference::InferenceError;
use vdet_models::{ModelKind, PredictionResponse};

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_queue_wait;
use crate::state::AppState;
use crate::upload::{save_upload, UploadGuard};

/// POST /predict
///
/// Multipart form with a `file` video and a `model` name. The model name is
/// validated before the video is decoded; the saved upload is removed when
/// the request finishes.
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<PredictionResponse>> {
    let mut model: Option<String> = None;
    let mut upload: Option<UploadGuard> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "model" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                model = Some(text.trim().to_string());
            }
            "file" => {
                upload = Some(save_upload(&state.config.temp_dir, field).await?);
            }
            _ => {}
        }
    }

    let model = model.ok_or_else(|| ApiError::bad_request("Missing 'model' field"))?;
    let kind: ModelKind = model.parse().map_err(InferenceError::from)?;
    let upload = upload.ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;

    let queued = Instant::now();
    let permit = Arc::clone(&state.inference_permits)
        .acquire_owned()
        .await
        .map_err(|_| ApiError::internal("Inference pool closed"))?;
    record_queue_wait(kind.as_str(), queued.elapsed().as_secs_f64());

    info!(
        model = %kind,
        filename = %upload.filename,
        bytes = upload.size,
        "Running inference"
    );

    let dispatcher = Arc::clone(&state.dispatcher);
    let report = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        dispatcher.predict_kind(kind, &upload.path, &upload.filename)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Inference task failed: {e}")))??;

    Ok(Json(report.into_response()))
}

/// Returns true if `name` is a plain file name inside the output directory.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

/// GET /annotated/{filename}
///
/// Streams a rendered annotated video as `video/mp4`.
pub async fn annotated_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if !is_safe_filename(&filename) {
        return Err(ApiError::not_found("File not found"));
    }

    let path = state.config.annotated_dir.join(&filename);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;
    if !metadata.is_file() {
        return Err(ApiError::not_found("File not found"));
    }

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{filename}\""),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {e}")))
}
