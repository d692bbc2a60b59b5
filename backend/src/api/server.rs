//! HTTP Server for the schedule parser API.
//!
//! # API Endpoints
//!
//! | Method | Path        | Description                                 |
//! |--------|-------------|---------------------------------------------|
//! | GET    | `/`         | Health check                                |
//! | GET    | `/health`   | Health check                                |
//! | POST   | `/parse`    | Upload a workbook, get one schedule / sheet |
//! | GET    | `/api/logs` | SSE stream for real-time logs               |

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use std::{convert::Infallible, net::SocketAddr, path::Path, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::HealthResponse;
use crate::ai::AiServices;
use crate::config::ParserOptions;
use crate::error::ServerError;
use crate::models::ProductSchedule;
use crate::transform::pipeline::extract_from_bytes;

/// Upload size limit for `POST /parse`
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Extensions accepted by `POST /parse`
const ACCEPTED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

/// Shared state for request handlers
pub struct AppState {
    pub services: AiServices,
    pub options: ParserOptions,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/parse", post(parse_upload))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Schedule parser running on http://localhost:{}", port);
    println!("   POST /parse      - Upload Excel or CSV schedule");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload endpoint: one schedule per sheet
async fn parse_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<ProductSchedule>>, ServerError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
                    .to_vec(),
            );
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;
    let file_name = file_name.unwrap_or_default();

    process_upload(&state, &file_name, &bytes).await.map(Json)
}

/// Check the extension and run the pipeline on uploaded bytes.
pub async fn process_upload(
    state: &AppState,
    file_name: &str,
    bytes: &[u8],
) -> Result<Vec<ProductSchedule>, ServerError> {
    if !is_accepted_upload(file_name) {
        return Err(ServerError::BadRequest(
            "Only Excel or CSV files are supported".to_string(),
        ));
    }

    log_info(format!("NEW UPLOAD: {} ({} bytes)", file_name, bytes.len()));

    extract_from_bytes(bytes, file_name, &state.services, &state.options)
        .await
        .map_err(|e| {
            let err = ServerError::from(e);
            log_error(err.to_string());
            err
        })
}

fn is_accepted_upload(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ACCEPTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
