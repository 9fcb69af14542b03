use serde::Deserialize;
use serde_json::json;

use pilgrim_accounts::AccountView;
use pilgrim_accounts::analytics::DirectoryQuery;

// -------------------------
// Request DTOs
// -------------------------

/// Absent fields deserialize as empty and are rejected by the ledger.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
}

impl From<UsersQuery> for DirectoryQuery {
    fn from(q: UsersQuery) -> Self {
        let defaults = DirectoryQuery::default();
        Self {
            page: q.page.unwrap_or(defaults.page),
            limit: q.limit.unwrap_or(defaults.limit),
            search: q.search,
        }
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn session_to_json(user: &AccountView, token: &str) -> serde_json::Value {
    json!({
        "user": user,
        "token": token,
    })
}
