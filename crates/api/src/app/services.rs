use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::Response;

use pilgrim_accounts::{AccountLedger, AccountView, Argon2Hasher, InMemoryAccountRepository};
use pilgrim_auth::Hs256Jwt;
use pilgrim_core::DomainResult;

use crate::app::errors;
use crate::config::{AdminBootstrap, ApiConfig};

pub type Ledger = AccountLedger<Arc<InMemoryAccountRepository>, Argon2Hasher>;

/// Everything a handler needs, shared behind one `Arc`.
pub struct AppServices {
    pub ledger: Ledger,
    pub tokens: Arc<Hs256Jwt>,
    pub started_at: Instant,
}

impl AppServices {
    pub fn build(config: &ApiConfig) -> DomainResult<Self> {
        let hasher = Argon2Hasher::new(config.hash_cost)?;
        let repo = Arc::new(InMemoryAccountRepository::new());
        let ledger = AccountLedger::new(repo, hasher, config.ledger.clone());
        let tokens = Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes(), config.token_ttl));

        Ok(Self {
            ledger,
            tokens,
            started_at: Instant::now(),
        })
    }

    /// Register the configured admin account and raise its flag.
    pub fn bootstrap_admin(&self, admin: &AdminBootstrap) -> DomainResult<AccountView> {
        let account = self
            .ledger
            .register(&admin.name, &admin.email, &admin.password)?;
        let account = self.ledger.set_admin(account.id, true)?;
        tracing::info!(
            account_id = %account.id,
            email = %account.email,
            "admin account bootstrapped"
        );
        Ok(account)
    }
}

/// Run a ledger call on the blocking pool.
///
/// Registration and login hash passwords, which must stay off the async workers.
pub async fn blocking<T, F>(services: Arc<AppServices>, f: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce(&Ledger) -> DomainResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&services.ledger)).await {
        Ok(result) => result.map_err(errors::domain_error_to_response),
        Err(e) => {
            tracing::error!(error = %e, "blocking ledger task failed");
            Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            ))
        }
    }
}
