use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    error_handling::AppResult,
    models::{ClaudeProbeResponse, RunFailure, RunRequest, RunSuccess},
    AppState,
};

/// GET /test-claude
pub async fn test_claude(State(state): State<AppState>) -> Json<ClaudeProbeResponse> {
    let result = state.bridge.probe_version().await;
    Json(ClaudeProbeResponse::from(result))
}

/// POST /run-stdin
///
/// A body that is absent or not valid JSON is treated the same as a missing
/// command.
pub async fn run_stdin(
    State(state): State<AppState>,
    payload: Option<Json<RunRequest>>,
) -> AppResult<Response> {
    let command = payload.map(|Json(p)| p).unwrap_or_default().into_command()?;

    let result = state.bridge.run_stdin(&command).await;
    if result.is_success() {
        Ok(Json(RunSuccess::from_result(result)).into_response())
    } else {
        Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RunFailure::from_stdin_result(result)),
        )
            .into_response())
    }
}

/// POST /run-pipe
pub async fn run_pipe(
    State(state): State<AppState>,
    payload: Option<Json<RunRequest>>,
) -> AppResult<Response> {
    let command = payload.map(|Json(p)| p).unwrap_or_default().into_command()?;

    let result = state.bridge.run_pipe(&command).await;
    if result.is_success() {
        Ok(Json(RunSuccess::from_result(result)).into_response())
    } else {
        Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RunFailure::from_pipe_result(result)),
        )
            .into_response())
    }
}
