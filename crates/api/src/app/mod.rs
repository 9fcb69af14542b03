//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger, hasher and token wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use pilgrim_core::DomainResult;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Creates the bootstrap admin, if configured, before returning.
pub fn build_app(config: &ApiConfig) -> DomainResult<Router> {
    let services = Arc::new(services::AppServices::build(config)?);
    if let Some(admin) = &config.admin {
        services.bootstrap_admin(admin)?;
    }

    let auth_state = middleware::AuthState {
        jwt: services.tokens.clone(),
    };
    let require_auth =
        axum::middleware::from_fn_with_state(auth_state, middleware::auth_middleware);

    let mut auth_routes = routes::auth::public_router()
        .merge(routes::auth::account_router().route_layer(require_auth.clone()));
    if let Some(limit) = config.auth_rate_limit {
        // Outermost, so unauthenticated attempts spend budget too.
        auth_routes = auth_routes.route_layer(axum::middleware::from_fn_with_state(
            middleware::RateLimitState::new(limit),
            middleware::rate_limit_middleware,
        ));
    }

    let admin_routes = routes::admin::router()
        .route_layer(axum::middleware::from_fn(middleware::require_admin))
        .route_layer(require_auth);

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::log_requests))
                .layer(Extension(services)),
        ))
}
