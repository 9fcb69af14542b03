//! Account storage abstraction.
//!
//! The ledger only talks to [`AccountRepository`]; the in-memory implementation
//! below is the default backing store. Emails arrive already normalized by the
//! ledger's email policy, so lookups here are exact.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pilgrim_core::{AccountId, DomainError, DomainResult, Entity};

use crate::account::{Account, NewAccount};

pub trait AccountRepository: Send + Sync {
    /// Assign the next sequential id and store the account.
    ///
    /// Must fail with `Conflict` if the email is already taken; the check and
    /// the insert are one atomic step.
    fn insert(&self, draft: NewAccount) -> DomainResult<Account>;

    fn find_by_id(&self, id: AccountId) -> Option<Account>;

    fn find_by_email(&self, email: &str) -> Option<Account>;

    /// Replace a stored account. `NotFound` if the id was never inserted.
    fn save(&self, account: &Account) -> DomainResult<()>;

    /// All accounts, ordered by id.
    fn list(&self) -> Vec<Account>;
}

impl<R> AccountRepository for Arc<R>
where
    R: AccountRepository + ?Sized,
{
    fn insert(&self, draft: NewAccount) -> DomainResult<Account> {
        (**self).insert(draft)
    }

    fn find_by_id(&self, id: AccountId) -> Option<Account> {
        (**self).find_by_id(id)
    }

    fn find_by_email(&self, email: &str) -> Option<Account> {
        (**self).find_by_email(email)
    }

    fn save(&self, account: &Account) -> DomainResult<()> {
        (**self).save(account)
    }

    fn list(&self) -> Vec<Account> {
        (**self).list()
    }
}

#[derive(Debug, Default)]
struct Inner {
    last_id: u64,
    accounts: BTreeMap<AccountId, Account>,
    by_email: HashMap<String, AccountId>,
}

/// In-memory repository for dev/tests.
#[derive(Debug, Default)]
pub struct InMemoryAccountRepository {
    inner: RwLock<Inner>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Writers validate before touching the maps, so a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccountRepository for InMemoryAccountRepository {
    fn insert(&self, draft: NewAccount) -> DomainResult<Account> {
        let mut inner = self.write();

        if inner.by_email.contains_key(&draft.email) {
            return Err(DomainError::conflict("an account with this email already exists"));
        }

        let id = AccountId::new(inner.last_id + 1);
        let account = Account::create(id, draft);

        inner.last_id = id.get();
        inner.by_email.insert(account.email().to_string(), id);
        inner.accounts.insert(id, account.clone());
        Ok(account)
    }

    fn find_by_id(&self, id: AccountId) -> Option<Account> {
        self.read().accounts.get(&id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<Account> {
        let inner = self.read();
        let id = inner.by_email.get(email)?;
        inner.accounts.get(id).cloned()
    }

    fn save(&self, account: &Account) -> DomainResult<()> {
        let mut inner = self.write();
        let Some(stored) = inner.accounts.get_mut(&account.id()) else {
            return Err(DomainError::not_found("account"));
        };
        if stored.email() != account.email() {
            return Err(DomainError::validation("email is immutable"));
        }
        *stored = account.clone();
        Ok(())
    }

    fn list(&self) -> Vec<Account> {
        self.read().accounts.values().cloned().collect()
    }
}
