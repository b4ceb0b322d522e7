//! REST API request and response types.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{IngestionError, PipelineError, ServerError, SessionError};
use crate::filter::Page;
use crate::stats::ColumnStats;
use crate::transform::pipeline::CsvInfo;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<Value>);

/// Response sent after a CSV upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Session to use for every later call
    pub session_id: Uuid,
    /// Upload sequence number
    pub upload_seq: u64,
    /// "ready", or "warning" when some column is entirely empty
    pub status: String,
    pub csv_info: CsvInfo,
    pub stats: Vec<ColumnStats>,
    /// First page of rows
    pub preview: Page,
}

/// Column statistics of a session's working table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub session_id: Uuid,
    pub rows: usize,
    pub stats: Vec<ColumnStats>,
}

/// Query string for preview pages: `?page=2&perPage=25&q=paris`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub q: Option<String>,
}

impl PageQuery {
    /// Search text, if non-blank.
    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Build an error body: `{ status, title, error }`.
pub fn error_response(title: &str, error: &str) -> Value {
    json!({
        "status": "error",
        "title": title,
        "error": error,
    })
}

/// HTTP status for a pipeline error.
pub fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Ingestion(IngestionError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        PipelineError::Ingestion(IngestionError::NotCsv(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        PipelineError::Ingestion(_) | PipelineError::Read(_) => StatusCode::BAD_REQUEST,
        PipelineError::Table(_) | PipelineError::Transform(_) | PipelineError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PipelineError::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
        PipelineError::Session(SessionError::StaleUpload { .. }) => StatusCode::CONFLICT,
        PipelineError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Status, title and message of a failed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiErrorBody {
    pub status: StatusCode,
    pub title: &'static str,
    pub message: String,
}

impl From<ServerError> for ApiErrorBody {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Pipeline(e) => ApiErrorBody {
                status: status_for(&e),
                title: e.title(),
                message: e.to_string(),
            },
            ServerError::BadRequest(msg) => ApiErrorBody {
                status: StatusCode::BAD_REQUEST,
                title: "Bad Request",
                message: msg,
            },
            ServerError::Internal(msg) => ApiErrorBody {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                title: "Server Error",
                message: msg,
            },
        }
    }
}

/// Convert any server-side failure into a handler error.
pub fn api_error(err: impl Into<ServerError>) -> ApiError {
    let body = ApiErrorBody::from(err.into());
    (body.status, Json(error_response(body.title, &body.message)))
}
