// Claude Bridge
// HTTP endpoints that run the claude CLI and return its captured output

pub mod bridge;
pub mod config;
pub mod error_handling;
pub mod handlers;
pub mod models;
pub mod routes;

pub use bridge::{InvocationResult, Outcome, ProcessBridge};
pub use config::{BridgeConfig, PipeMode};
pub use error_handling::{AppError, AppResult};

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use error_handling::{handle_404, trace_request};

#[derive(Clone)]
pub struct AppState {
    pub config: BridgeConfig,
    pub bridge: Arc<ProcessBridge>,
}

impl AppState {
    pub fn new(config: BridgeConfig) -> Self {
        let bridge = Arc::new(ProcessBridge::new(&config));
        Self { config, bridge }
    }

    /// Use an already configured bridge, e.g. one with a shorter deadline.
    pub fn with_bridge(config: BridgeConfig, bridge: ProcessBridge) -> Self {
        Self {
            config,
            bridge: Arc::new(bridge),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    routes::bridge_routes()
        .fallback(handle_404)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(trace_request))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}
