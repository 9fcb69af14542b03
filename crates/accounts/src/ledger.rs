//! Account & visit ledger.
//!
//! Owns the four account operations (register, authenticate, record visit,
//! update profile) plus the privileged admin flag. Storage is injected through
//! [`AccountRepository`], hashing through [`CredentialHasher`].
//!
//! # Invariants
//! - `stats.total_visits == visited.len()` for every stored account.
//! - Every stored account holds at least the default badge.
//! - Operations on the same account are serialized; different accounts proceed
//!   in parallel.
//! - A failed operation leaves the stored account untouched: mutations happen
//!   on a copy that is saved only once everything succeeded.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use chrono::Utc;

use pilgrim_core::{AccountId, DomainError, DomainResult, Entity, MonasteryId};

use crate::account::{Account, AccountView, NewAccount, ProfileUpdate, VisitOutcome};
use crate::badges::BadgeTable;
use crate::password::{Credential, CredentialHasher};
use crate::repository::AccountRepository;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How emails are compared when storing and looking up accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmailPolicy {
    /// Byte-for-byte match. `A@x.com` and `a@x.com` are different accounts.
    #[default]
    Exact,
    /// Trim and lowercase before storing and before lookup.
    CaseInsensitive,
}

impl EmailPolicy {
    pub fn normalize<'a>(&self, email: &'a str) -> Cow<'a, str> {
        match self {
            EmailPolicy::Exact => Cow::Borrowed(email),
            EmailPolicy::CaseInsensitive => Cow::Owned(email.trim().to_lowercase()),
        }
    }
}

impl FromStr for EmailPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "case-insensitive" | "case_insensitive" => Ok(Self::CaseInsensitive),
            other => Err(DomainError::validation(format!(
                "unknown email policy '{other}' (expected: exact, case-insensitive)"
            ))),
        }
    }
}

/// Ledger tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub badges: BadgeTable,
    pub email_policy: EmailPolicy,
    pub min_password_len: usize,
    /// When set, visits to monasteries outside this set are rejected.
    pub known_monasteries: Option<BTreeSet<MonasteryId>>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            badges: BadgeTable::canonical(),
            email_policy: EmailPolicy::Exact,
            min_password_len: 6,
            known_monasteries: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-account locks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct AccountLocks {
    locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    fn for_account(&self, id: AccountId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────────────────────────

/// Authoritative collection of accounts.
pub struct AccountLedger<R, H> {
    repo: R,
    hasher: H,
    config: LedgerConfig,
    locks: AccountLocks,
    decoy: OnceLock<Option<Credential>>,
}

impl<R, H> AccountLedger<R, H>
where
    R: AccountRepository,
    H: CredentialHasher,
{
    pub fn new(repo: R, hasher: H, config: LedgerConfig) -> Self {
        Self {
            repo,
            hasher,
            config,
            locks: AccountLocks::default(),
            decoy: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Create an account.
    ///
    /// Fails with `Validation` on missing fields or a short password and with
    /// `Conflict` if the email is taken.
    pub fn register(&self, name: &str, email: &str, password: &str) -> DomainResult<AccountView> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        if email.trim().is_empty() {
            return Err(DomainError::validation("email is required"));
        }
        if !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if password.is_empty() {
            return Err(DomainError::validation("password is required"));
        }
        if password.chars().count() < self.config.min_password_len {
            return Err(DomainError::validation(format!(
                "password must be at least {} characters long",
                self.config.min_password_len
            )));
        }

        let email = self.config.email_policy.normalize(email);

        // Cheap early exit; the repository re-checks atomically on insert.
        if self.repo.find_by_email(&email).is_some() {
            return Err(DomainError::conflict("an account with this email already exists"));
        }

        let credential = self.hasher.hash(password)?;
        let account = self.repo.insert(NewAccount {
            name: name.to_string(),
            email: email.into_owned(),
            credential,
            joined_at: Utc::now(),
        })?;

        tracing::info!(account_id = %account.id(), "account registered");
        Ok(account.view())
    }

    /// Verify credentials and count the login.
    ///
    /// Unknown email and wrong password produce the same
    /// [`DomainError::InvalidCredentials`].
    pub fn authenticate(&self, email: &str, password: &str) -> DomainResult<AccountView> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(DomainError::validation("email and password are required"));
        }

        let email = self.config.email_policy.normalize(email);

        let Some(account) = self.repo.find_by_email(&email) else {
            self.burn_decoy_verification(password);
            tracing::debug!("authentication failed");
            return Err(DomainError::InvalidCredentials);
        };

        if !self.hasher.verify(password, account.credential())? {
            tracing::debug!("authentication failed");
            return Err(DomainError::InvalidCredentials);
        }

        let view = self.mutate(account.id(), |acc| {
            acc.record_login();
            Ok(true)
        })?;

        tracing::info!(account_id = %view.id, login_count = view.stats.login_count, "login");
        Ok(view)
    }

    /// Record a visit; grants badges whose threshold equals the new total.
    ///
    /// Visiting an already-visited monastery is a no-op that returns the
    /// current state.
    pub fn record_visit(
        &self,
        account_id: AccountId,
        monastery_id: MonasteryId,
    ) -> DomainResult<VisitOutcome> {
        if monastery_id.get() == 0 {
            return Err(DomainError::validation("monastery id must be positive"));
        }
        if let Some(known) = &self.config.known_monasteries {
            if !known.contains(&monastery_id) {
                return Err(DomainError::not_found("monastery"));
            }
        }

        let lock = self.lock_existing(account_id)?;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut account = self
            .repo
            .find_by_id(account_id)
            .ok_or(DomainError::not_found("account"))?;

        let Some(awarded) = account.add_visit(monastery_id, &self.config.badges) else {
            tracing::debug!(%account_id, %monastery_id, "visit already recorded");
            return Ok(VisitOutcome::from(&account));
        };

        self.repo.save(&account)?;

        tracing::info!(
            %account_id,
            %monastery_id,
            total_visits = account.stats().total_visits,
            "visit recorded"
        );
        for badge in &awarded {
            tracing::info!(%account_id, badge = %badge, "badge awarded");
        }

        Ok(VisitOutcome::from(&account))
    }

    /// Change name and/or merge preferences.
    pub fn update_profile(
        &self,
        account_id: AccountId,
        update: ProfileUpdate,
    ) -> DomainResult<AccountView> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }

        let view = self.mutate(account_id, move |acc| {
            acc.apply_profile(update);
            Ok(true)
        })?;

        tracing::info!(%account_id, "profile updated");
        Ok(view)
    }

    /// Grant or revoke admin privileges. Callers decide who may invoke this.
    pub fn set_admin(&self, account_id: AccountId, is_admin: bool) -> DomainResult<AccountView> {
        let view = self.mutate(account_id, |acc| {
            let changed = acc.is_admin() != is_admin;
            acc.set_admin(is_admin);
            Ok(changed)
        })?;

        tracing::info!(%account_id, is_admin, "admin flag set");
        Ok(view)
    }

    pub fn get(&self, account_id: AccountId) -> DomainResult<AccountView> {
        self.repo
            .find_by_id(account_id)
            .map(|a| a.view())
            .ok_or(DomainError::not_found("account"))
    }

    /// Snapshot of every account, ordered by id.
    pub fn accounts(&self) -> Vec<AccountView> {
        self.repo.list().iter().map(Account::view).collect()
    }

    /// Load, mutate a copy, save if `f` reports a change. Serialized per account.
    fn mutate<F>(&self, account_id: AccountId, f: F) -> DomainResult<AccountView>
    where
        F: FnOnce(&mut Account) -> DomainResult<bool>,
    {
        let lock = self.lock_existing(account_id)?;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut account = self
            .repo
            .find_by_id(account_id)
            .ok_or(DomainError::not_found("account"))?;

        if f(&mut account)? {
            self.repo.save(&account)?;
        }
        Ok(account.view())
    }

    /// Lock entry for a stored account. Accounts are never removed, so an id
    /// seen here stays valid; unknown ids never reach the lock table.
    fn lock_existing(&self, account_id: AccountId) -> DomainResult<Arc<Mutex<()>>> {
        if self.repo.find_by_id(account_id).is_none() {
            return Err(DomainError::not_found("account"));
        }
        Ok(self.locks.for_account(account_id))
    }

    /// Spend one verification on a throwaway credential so that an unknown
    /// email costs as much as a wrong password.
    fn burn_decoy_verification(&self, password: &str) {
        let decoy = self
            .decoy
            .get_or_init(|| self.hasher.hash("pilgrim-decoy-credential").ok());
        if let Some(decoy) = decoy {
            let _ = self.hasher.verify(password, decoy);
        }
    }
}
