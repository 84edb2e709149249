//! `/`: upload form and the prediction endpoint.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;

use super::error::ApiError;
use super::router::AppState;
use crate::config::UPLOAD_FIELD;
use crate::pipeline::{PipelineError, ResultRecord, UploadRequest};

pub async fn page() -> Html<&'static str> {
    Html(UPLOAD_PAGE_HTML)
}

/// `POST /`: run the pipeline on the `file` field and return one record per row.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<ResultRecord>>, ApiError> {
    // Not a multipart body at all: same answer as a form without a file
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(%rejection, "Upload without multipart body");
        ApiError::from(PipelineError::MissingFile)
    })?;

    let upload = read_file_field(&mut multipart, state.max_upload_bytes)
        .await?
        .ok_or(PipelineError::MissingFile)?;

    // Reject before buffering work onto the blocking pool
    state.pipeline.gatekeeper().check(&upload.filename)?;

    let pipeline = state.pipeline.clone();
    let results = tokio::task::spawn_blocking(move || pipeline.run(upload))
        .await
        .map_err(|e| ApiError::Internal(format!("Pipeline task failed: {e}")))??;

    Ok(Json(results))
}

/// First multipart part named `file` that carries a filename.
/// Parts without a filename are plain form fields, not uploads.
async fn read_file_field(
    multipart: &mut Multipart,
    limit_bytes: usize,
) -> Result<Option<UploadRequest>, ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err(multipart_error(e, limit_bytes)),
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit_bytes))?;

        return Ok(Some(UploadRequest {
            filename,
            bytes: bytes.to_vec(),
        }));
    }
}

fn multipart_error(err: MultipartError, limit_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit_bytes }
    } else {
        tracing::warn!(error = %err, "Failed to read upload bytes");
        ApiError::BadRequest(format!("Uploading failed! {}", err.body_text()))
    }
}

// ---------------------------------------------------------------------------
// Upload page HTML (self-contained, no external resources)
// ---------------------------------------------------------------------------

const UPLOAD_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>GradAPI</title>
  <style>
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', system-ui, sans-serif;
      background: #fafaf9; color: #1c1917; max-width: 560px; margin: 48px auto; padding: 0 24px;
    }
    h1 { font-size: 24px; margin-bottom: 8px; }
    p { color: #78716c; font-size: 14px; }
    button { padding: 10px 20px; border-radius: 8px; border: none; background: #4a7c59; color: white; }
  </style>
</head>
<body>
  <h1>GradAPI</h1>
  <p>Upload an .xlsx file with student records to get the expected number of failing grades per student.</p>
  <form method="post" enctype="multipart/form-data">
    <input type="file" name="file" accept=".xlsx">
    <button type="submit">Upload</button>
  </form>
</body>
</html>"#;
