//! HTTP API application wiring (Axum router + recipe wiring).
//!
//! - `services.rs`: builds the [`AuthKit`] from [`ApiConfig`](crate::config::ApiConfig)
//! - `routes/`: HTTP routes + handlers (one file per recipe)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: status bodies and error responses

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use authkit::AuthKit;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(kit: AuthKit) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(&kit))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::tenant_middleware))
                .layer(Extension(kit)),
        )
}
