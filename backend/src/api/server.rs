//! HTTP server for the tabclean API.
//!
//! # API Endpoints
//!
//! | Method | Path                              | Description                      |
//! |--------|-----------------------------------|----------------------------------|
//! | GET    | `/health`                         | Health check                     |
//! | POST   | `/api/upload`                     | Upload a CSV, open a session     |
//! | GET    | `/api/sessions/{id}`              | Preview page (`page`, `perPage`, `q`) |
//! | DELETE | `/api/sessions/{id}`              | Close a session                  |
//! | GET    | `/api/sessions/{id}/stats`        | Column statistics                |
//! | GET    | `/api/sessions/{id}/suggest`      | Suggested transform spec         |
//! | POST   | `/api/sessions/{id}/transform`    | Apply a transform spec           |
//! | POST   | `/api/sessions/{id}/filter`       | Filter/project from the original |
//! | POST   | `/api/sessions/{id}/reset`        | Restore the ingested table       |
//! | POST   | `/api/sessions/{id}/chart`        | Data points for a chart config   |
//! | GET    | `/api/sessions/{id}/export`       | Download the working table       |
//! | GET    | `/api/logs`                       | SSE stream for real-time logs    |
//!
//! Uploads are sequenced per `X-Client-Id` header; a superseded upload is
//! answered with `409 Conflict`.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{sse::Event, sse::KeepAlive, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, path::Path as FsPath, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{api_error, ApiError, PageQuery, StatsResponse, UploadResponse};
use crate::charts::{ChartConfig, DataPoint};
use crate::config::Config;
use crate::error::{ReadError, ServerError, TableError};
use crate::filter::{FilterSpec, Page};
use crate::parser::{ensure_csv_extension, parse_bytes, IngestOptions, ParseResult};
use crate::session::{Session, SessionStore, TransformReport, UploadTicket, UploadTracker};
use crate::transform::pipeline::CsvInfo;
use crate::transform::TransformSpec;

/// Header identifying the uploading client for upload sequencing.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub uploads: Arc<UploadTracker>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let sessions = SessionStore::with_limit(config.max_sessions);
        Self {
            config: Arc::new(config),
            sessions,
            uploads: Arc::new(UploadTracker::new()),
        }
    }

    fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            delimiter: None,
            dynamic_typing: self.config.dynamic_typing,
            max_bytes: Some(self.config.max_upload_bytes),
        }
    }

    fn page(&self, session: &Session, query: &PageQuery) -> Page {
        session.page(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(self.config.page_size),
            query.search(),
        )
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(CLIENT_ID_HEADER),
        ])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_csv))
        .route("/api/sessions/{id}", get(preview).delete(close_session))
        .route("/api/sessions/{id}/stats", get(stats))
        .route("/api/sessions/{id}/suggest", get(suggest))
        .route("/api/sessions/{id}/transform", post(transform))
        .route("/api/sessions/{id}/filter", post(filter))
        .route("/api/sessions/{id}/reset", post(reset))
        .route("/api/sessions/{id}/chart", post(chart))
        .route("/api/sessions/{id}/export", get(export))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.port;
    let app = router(AppState::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 tabclean server running on http://localhost:{}", port);
    println!("   POST /api/upload              - Upload CSV file");
    println!("   GET  /api/sessions/{{id}}       - Preview rows");
    println!("   POST /api/sessions/{{id}}/...   - transform, filter, reset, chart");
    println!("   GET  /api/sessions/{{id}}/export - Download CSV");
    println!("   GET  /api/logs                - SSE log stream");
    println!("   GET  /health                  - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tabclean",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "sessions": "/api/sessions/{id}",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the missed entries
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload CSV endpoint
async fn upload_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let client = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string();
    let ticket = state.uploads.begin(&client);

    let parsed = match receive_csv(&state, &mut multipart, &ticket).await {
        Ok(parsed) => parsed,
        Err(e) => {
            state.uploads.abandon(&ticket);
            return Err(e);
        }
    };

    state.uploads.accept(&ticket).map_err(api_error)?;

    let csv_info = CsvInfo::from(&parsed);
    let session = Session::with_upload_seq(parsed.table, ticket.seq());
    let stats = session.stats();
    let preview = state.page(&session, &PageQuery::default());
    let status = if stats.iter().any(|s| s.null_count == csv_info.row_count) {
        "warning"
    } else {
        "ready"
    };

    let session_id = state.sessions.insert(session).await;
    log_success(format!(
        "Session {} ready: {} rows, {} columns",
        session_id,
        csv_info.row_count,
        csv_info.headers.len()
    ));

    Ok(Json(UploadResponse {
        session_id,
        upload_seq: ticket.seq(),
        status: status.to_string(),
        csv_info,
        stats,
        preview,
    }))
}

/// Read the multipart `file` field and parse it.
async fn receive_csv(
    state: &AppState,
    multipart: &mut Multipart,
    ticket: &UploadTicket,
) -> Result<ParseResult, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(ReadError::Stream(e.to_string())))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| api_error(ReadError::Stream(e.to_string())))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| api_error(ServerError::BadRequest("No file provided".into())))?;

    if let Some(ref name) = file_name {
        ensure_csv_extension(FsPath::new(name)).map_err(api_error)?;
    }

    log_info(format!(
        "New upload #{}: {} ({} bytes)",
        ticket.seq(),
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let parsed = parse_bytes(&bytes, &state.ingest_options()).map_err(|e| {
        log_error(format!("Upload #{} rejected: {}", ticket.seq(), e));
        api_error(e)
    })?;

    Ok(parsed)
}

async fn preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page>, ApiError> {
    let page = state
        .sessions
        .read(id, |s| state.page(s, &query))
        .await
        .map_err(api_error)?;
    Ok(Json(page))
}

async fn close_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    match state.sessions.remove(id).await {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn stats(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<StatsResponse>, ApiError> {
    let response = state
        .sessions
        .read(id, |s| StatsResponse {
            session_id: id,
            rows: s.current().row_count(),
            stats: s.stats(),
        })
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

async fn suggest(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<TransformSpec>, ApiError> {
    let spec = state.sessions.read(id, Session::suggest).await.map_err(api_error)?;
    Ok(Json(spec))
}

/// Apply a transform spec. The body is a spec document or a bare column mapping.
async fn transform(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: String,
) -> Result<Json<TransformReport>, ApiError> {
    let spec = TransformSpec::from_json(&body).map_err(api_error)?;

    let report = state
        .sessions
        .write(id, |s| s.apply_transform(&spec))
        .await
        .map_err(api_error)?
        .map_err(api_error)?;

    log_success(format!(
        "Session {}: {} rows after transform, {} removed",
        id, report.rows, report.rows_removed
    ));
    Ok(Json(report))
}

async fn filter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(spec): Json<FilterSpec>,
) -> Result<Json<Page>, ApiError> {
    let page = state
        .sessions
        .write(id, |s| {
            s.apply_filter(&spec)?;
            Ok::<_, TableError>(state.page(s, &PageQuery::default()))
        })
        .await
        .map_err(api_error)?
        .map_err(api_error)?;
    Ok(Json(page))
}

async fn reset(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Page>, ApiError> {
    let page = state
        .sessions
        .write(id, |s| {
            s.reset();
            state.page(s, &PageQuery::default())
        })
        .await
        .map_err(api_error)?;
    Ok(Json(page))
}

async fn chart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(config): Json<ChartConfig>,
) -> Result<Json<Vec<DataPoint>>, ApiError> {
    let points = state
        .sessions
        .read(id, |s| config.data(s.current()))
        .await
        .map_err(api_error)?
        .map_err(api_error)?;
    Ok(Json(points))
}

/// Download the working table as CSV.
async fn export(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, ApiError> {
    let csv = state
        .sessions
        .read(id, Session::export_csv)
        .await
        .map_err(api_error)?
        .map_err(api_error)?;

    let disposition = format!("attachment; filename=\"{}\"", state.config.export_file_name);
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| api_error(ServerError::Internal(e.to_string())))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
