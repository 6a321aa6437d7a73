//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and engine construction
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use tableforge_engine::EngineConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: EngineConfig) -> Router {
    let auth_state = middleware::AuthState {
        engine_key: Arc::new(config.engine_key.clone()),
    };

    let engine = Arc::new(services::build_engine(config).await);

    // Protected routes: require the pre-shared engine key.
    let protected = routes::router()
        .layer(Extension(engine))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::engine_key_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
