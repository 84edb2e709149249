//! HTTP error rendering.
//!
//! Client-classified failures become `400 text/plain` carrying the pipeline's
//! message. Everything else becomes a generic HTML page; the detail is logged
//! server-side and never sent to the client.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::config::APP_TITLE;
use crate::pipeline::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Upload exceeds the {limit_bytes} byte limit")]
    PayloadTooLarge { limit_bytes: usize },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiError::PayloadTooLarge { limit_bytes } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "Uploading failed! File is too large. Maximum {}.",
                    format_limit(limit_bytes)
                ),
            )
                .into_response(),
            ApiError::NotFound(path) => (
                StatusCode::NOT_FOUND,
                Html(error_page(
                    "404",
                    &format!("Page {} not found.", html_escape(&path)),
                )),
            )
                .into_response(),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(error_page(
                        "500",
                        "Something went wrong on our side. Please try again later.",
                    )),
                )
                    .into_response()
            }
        }
    }
}

fn error_page(code: &str, text: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{APP_TITLE}: {code}</title></head>\n\
         <body><h1>{code}</h1><p>{text}</p><p><a href=\"/\">Back to upload</a></p></body>\n</html>"
    )
}

fn html_escape(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '&' => "&amp;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Whole megabytes when the limit is an exact multiple, bytes otherwise.
fn format_limit(limit_bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if limit_bytes >= MIB && limit_bytes % MIB == 0 {
        format!("{} MB", limit_bytes / MIB)
    } else {
        format!("{limit_bytes} bytes")
    }
}
