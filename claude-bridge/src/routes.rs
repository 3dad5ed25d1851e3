use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

pub fn bridge_routes() -> Router<AppState> {
    Router::new()
        .route("/test-claude", get(handlers::test_claude))
        .route("/run-stdin", post(handlers::run_stdin))
        .route("/run-pipe", post(handlers::run_pipe))
        .route("/health", get(handlers::health_check))
}
