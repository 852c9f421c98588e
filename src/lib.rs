pub mod api;
pub mod b64;
pub mod cli;
pub mod digest;
pub mod live;
pub mod poll;
pub mod protocol;
pub mod read;
pub mod reconcile;
pub mod store;
pub mod sync;

use api::ServerState;
use axum::{routing::get, Router};
use poll::PollConfig;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

async fn health_check() -> &'static str {
    "OK"
}

/// Configuration for creating a router.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Retry budget for `sync` and `read`.
    pub static_poll: PollConfig,
    /// Retry budget for `watch`.
    pub live_poll: PollConfig,
}

impl RouterConfig {
    /// The server's stock budgets: three half-second rounds for static
    /// requests, a single immediate check for `watch`.
    pub fn standard() -> Self {
        Self {
            static_poll: PollConfig::static_default(),
            live_poll: PollConfig::live_default(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Create a router over fresh, empty stores.
pub fn create_router_with_config(config: RouterConfig) -> Router {
    let state = Arc::new(ServerState::new(config.static_poll, config.live_poll));
    create_router_with_state(state)
}

/// Create a router over existing state, e.g. to inspect the stores in tests.
pub fn create_router_with_state(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(api::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub fn create_router() -> Router {
    create_router_with_config(RouterConfig::standard())
}
