//! `pilgrim-accounts` — account & visit ledger.
//!
//! Identities, credential verification, monastery visits and the badges they
//! unlock. Decoupled from HTTP: storage and hashing are injected.

pub mod account;
pub mod analytics;
pub mod badges;
pub mod ledger;
pub mod password;
pub mod repository;

pub use account::{
    Account, AccountStats, AccountView, NewAccount, Preferences, PreferencesPatch, ProfileUpdate,
    VisitOutcome,
};
pub use badges::{BadgeTable, BadgeThreshold, DEFAULT_BADGE};
pub use ledger::{AccountLedger, EmailPolicy, LedgerConfig};
pub use password::{Argon2Hasher, Credential, CredentialHasher, HashCost};
pub use repository::{AccountRepository, InMemoryAccountRepository};
