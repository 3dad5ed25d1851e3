use axum::{extract::State, Json};

use crate::{
    bridge::InvocationResult,
    models::{HealthResponse, RUNTIME_VERSION},
    AppState,
};

/// GET /health
///
/// Probes the configured node and npm tools; either failing turns the whole
/// response into an error status.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let node = state.bridge.probe_tool(&state.config.node_bin).await;
    let node_version = match trimmed_version(node) {
        Ok(version) => version,
        Err(error) => return Json(error_status(error)),
    };

    let npm = state.bridge.probe_tool(&state.config.npm_bin).await;
    let npm_version = match trimmed_version(npm) {
        Ok(version) => version,
        Err(error) => return Json(error_status(error)),
    };

    Json(HealthResponse::Ok {
        status: "ok".to_string(),
        workspace: state.bridge.workspace().display().to_string(),
        node_version,
        npm_version,
        process_node_version: RUNTIME_VERSION.to_string(),
    })
}

fn trimmed_version(result: InvocationResult) -> Result<String, String> {
    match result.failure_message() {
        None => Ok(result.stdout.trim().to_string()),
        Some(error) => Err(error),
    }
}

fn error_status(error: String) -> HealthResponse {
    HealthResponse::Error {
        status: "error".to_string(),
        error,
    }
}
