//! Tamil Voice Gateway - HTTP API for speech, translation and voice conversation
//!
//! This library provides the HTTP surface of the gateway: the auth gate, the
//! listen, speak and conversation pipelines, the session store and the
//! routes that expose them.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod sessions;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use error::*;
pub use server::GatewayServer;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the main application router with all routes and middleware
pub fn create_app(server: GatewayServer) -> Router {
    routes::create_routes(&server)
        .layer(from_fn_with_state(server.clone(), middleware::rate_limit_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::create_cors_layer(&server.config.cors_allowed_origins))
                .layer(from_fn(middleware::request_timing_middleware))
                .layer(from_fn(middleware::audit_logging_middleware))
                .layer(DefaultBodyLimit::max(server.config.body_limit_bytes)),
        )
        .with_state(server)
}
