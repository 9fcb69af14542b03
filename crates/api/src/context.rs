use pilgrim_auth::AccountClaims;
use pilgrim_core::AccountId;

/// Authenticated caller for a request, derived from a verified token.
///
/// Present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    account_id: AccountId,
    email: String,
}

impl PrincipalContext {
    pub fn new(account_id: AccountId, email: impl Into<String>) -> Self {
        Self {
            account_id,
            email: email.into(),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<AccountClaims> for PrincipalContext {
    fn from(claims: AccountClaims) -> Self {
        Self::new(claims.sub, claims.email)
    }
}
