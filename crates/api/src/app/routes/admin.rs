use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use chrono::Utc;
use serde_json::json;

use pilgrim_accounts::analytics::{self, DirectoryQuery};
use pilgrim_core::{AccountId, DomainError};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/:id/admin", put(set_admin))
        .route("/analytics", get(engagement))
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let now = Utc::now();
    let accounts = services.ledger.accounts();
    let dashboard = analytics::dashboard(&accounts, now.date_naive());

    (
        StatusCode::OK,
        Json(json!({
            "dashboard": dashboard,
            "system": {
                "uptime_seconds": services.started_at.elapsed().as_secs(),
                "timestamp": now,
            },
        })),
    )
        .into_response()
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::UsersQuery>,
) -> axum::response::Response {
    let accounts = services.ledger.accounts();
    let page = analytics::search(&accounts, &DirectoryQuery::from(query));
    (StatusCode::OK, Json(page)).into_response()
}

pub async fn engagement(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let accounts = services.ledger.accounts();
    (
        StatusCode::OK,
        Json(json!({
            "engagement": analytics::engagement(&accounts),
            "generated_at": Utc::now(),
        })),
    )
        .into_response()
}

pub async fn set_admin(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetAdminRequest>,
) -> axum::response::Response {
    let account_id = match id.parse::<AccountId>() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    // An admin cannot lock themselves out.
    if account_id == principal.account_id() && !body.is_admin {
        return errors::domain_error_to_response(DomainError::validation(
            "cannot revoke your own admin privileges",
        ));
    }

    match services.ledger.set_admin(account_id, body.is_admin) {
        Ok(user) => {
            tracing::info!(
                by = %principal.account_id(),
                account_id = %user.id,
                is_admin = user.is_admin,
                "admin flag changed"
            );
            (StatusCode::OK, Json(user)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
