use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No command provided")]
    MissingCommand,
}

/// Body for client errors, `{"error": "..."}`.
#[derive(Serialize, Deserialize, Debug)]
pub struct ClientError {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MissingCommand => {
                warn!("Rejected request without a command");
                StatusCode::BAD_REQUEST
            }
        };

        (
            status,
            Json(ClientError {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub async fn handle_404(uri: Uri) -> impl IntoResponse {
    warn!("No route for {}", uri.path());
    (
        StatusCode::NOT_FOUND,
        Json(ClientError {
            error: format!("No route found for {}", uri.path()),
        }),
    )
}

pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Logs each request under a fresh trace id and echoes the id back in the
/// `x-trace-id` response header.
pub async fn trace_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let trace_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        uri = %uri,
        "Request started"
    );

    let mut response = next.run(request).await;

    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    response
}
