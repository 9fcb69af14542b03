use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use pilgrim_accounts::{AccountView, ProfileUpdate};
use pilgrim_auth::JwtIssuer;
use pilgrim_core::MonasteryId;

use crate::app::services::{self, AppServices};
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Endpoints acting on the caller's own account.
pub fn account_router() -> Router {
    Router::new()
        .route("/profile", get(profile).put(update_profile))
        .route("/visit/:monastery_id", post(record_visit))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    let user = match services::blocking(services.clone(), move |ledger| {
        ledger.register(&body.name, &body.email, &body.password)
    })
    .await
    {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match issue_token(&services, &user) {
        Ok(token) => {
            (StatusCode::CREATED, Json(dto::session_to_json(&user, &token))).into_response()
        }
        Err(resp) => resp,
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let user = match services::blocking(services.clone(), move |ledger| {
        ledger.authenticate(&body.email, &body.password)
    })
    .await
    {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match issue_token(&services, &user) {
        Ok(token) => (StatusCode::OK, Json(dto::session_to_json(&user, &token))).into_response(),
        Err(resp) => resp,
    }
}

pub async fn profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.ledger.get(principal.account_id()) {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ProfileUpdate>,
) -> axum::response::Response {
    match services.ledger.update_profile(principal.account_id(), body) {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn record_visit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(monastery_id): Path<String>,
) -> axum::response::Response {
    let monastery_id = match monastery_id.parse::<MonasteryId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.ledger.record_visit(principal.account_id(), monastery_id) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

fn issue_token(
    services: &AppServices,
    user: &AccountView,
) -> Result<String, axum::response::Response> {
    services.tokens.issue(user.id, &user.email, Utc::now()).map_err(|e| {
        tracing::error!(error = %e, account_id = %user.id, "failed to issue token");
        errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
    })
}
