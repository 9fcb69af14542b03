//! Account entity and its public views.
//!
//! Fields are private: the ledger is the only mutation path, which keeps
//! `stats.total_visits == visited.len()` and a non-empty badge set true for
//! every stored account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pilgrim_core::{AccountId, Entity, MonasteryId};

use crate::badges::{BadgeTable, DEFAULT_BADGE};
use crate::password::Credential;

// ─────────────────────────────────────────────────────────────────────────────
// Stats & Preferences
// ─────────────────────────────────────────────────────────────────────────────

/// Visit and session counters. Never decremented by the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub total_visits: u32,
    pub completed_tours: u32,
    pub forum_posts: u32,
    pub login_count: u32,
}

/// Owner-controlled settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub language: String,
    pub notifications: bool,
    pub theme: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            notifications: true,
            theme: "light".to_string(),
        }
    }
}

/// Partial preferences; absent keys keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesPatch {
    pub language: Option<String>,
    pub notifications: Option<bool>,
    pub theme: Option<String>,
}

impl Preferences {
    /// Merge key-by-key.
    pub fn merge(&mut self, patch: PreferencesPatch) {
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(notifications) = patch.notifications {
            self.notifications = notifications;
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
    }
}

/// Input of `update_profile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub preferences: Option<PreferencesPatch>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Account
// ─────────────────────────────────────────────────────────────────────────────

/// A validated registration waiting for an identifier.
///
/// The repository assigns the id when it stores the draft.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub credential: Credential,
    pub joined_at: DateTime<Utc>,
}

/// A registered user identity with credentials, visit history and badges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    name: String,
    email: String,
    credential: Credential,
    visited: Vec<MonasteryId>,
    badges: Vec<String>,
    stats: AccountStats,
    preferences: Preferences,
    joined_at: DateTime<Utc>,
    is_admin: bool,
}

impl Account {
    /// Materialize a draft under its assigned identifier.
    pub fn create(id: AccountId, draft: NewAccount) -> Self {
        Self {
            id,
            name: draft.name,
            email: draft.email,
            credential: draft.credential,
            visited: Vec::new(),
            badges: vec![DEFAULT_BADGE.to_string()],
            stats: AccountStats::default(),
            preferences: Preferences::default(),
            joined_at: draft.joined_at,
            is_admin: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub(crate) fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn visited(&self) -> &[MonasteryId] {
        &self.visited
    }

    pub fn badges(&self) -> &[String] {
        &self.badges
    }

    pub fn stats(&self) -> AccountStats {
        self.stats
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn has_visited(&self, monastery_id: MonasteryId) -> bool {
        self.visited.contains(&monastery_id)
    }

    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.iter().any(|b| b == badge)
    }

    /// Serializable view without the credential.
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            badges: self.badges.clone(),
            stats: self.stats,
            visited_monasteries: self.visited.clone(),
            preferences: self.preferences.clone(),
            joined_at: self.joined_at,
            is_admin: self.is_admin,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations (ledger only)
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn record_login(&mut self) {
        self.stats.login_count = self.stats.login_count.saturating_add(1);
    }

    /// Grant `badge` unless already held. Returns whether it was new.
    pub(crate) fn award_badge(&mut self, badge: &str) -> bool {
        if self.has_badge(badge) {
            return false;
        }
        self.badges.push(badge.to_string());
        true
    }

    /// Record a visit and grant badges for the new total.
    ///
    /// Returns the badges granted by this call, or `None` if the monastery was
    /// already in the visited set (no-op).
    pub(crate) fn add_visit(
        &mut self,
        monastery_id: MonasteryId,
        table: &BadgeTable,
    ) -> Option<Vec<String>> {
        if self.has_visited(monastery_id) {
            return None;
        }

        self.visited.push(monastery_id);
        self.stats.total_visits = self.stats.total_visits.saturating_add(1);

        let mut awarded = Vec::new();
        for badge in table.badges_for(self.stats.total_visits) {
            if self.award_badge(badge) {
                awarded.push(badge.to_string());
            }
        }
        Some(awarded)
    }

    pub(crate) fn apply_profile(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(patch) = update.preferences {
            self.preferences.merge(patch);
        }
    }

    pub(crate) fn set_admin(&mut self, is_admin: bool) {
        self.is_admin = is_admin;
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> AccountId {
        self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

/// What callers of the ledger get back. Never contains the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub badges: Vec<String>,
    pub stats: AccountStats,
    pub visited_monasteries: Vec<MonasteryId>,
    pub preferences: Preferences,
    pub joined_at: DateTime<Utc>,
    pub is_admin: bool,
}

/// Result of `record_visit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitOutcome {
    pub visited_monasteries: Vec<MonasteryId>,
    pub badges: Vec<String>,
    pub stats: AccountStats,
}

impl From<&Account> for VisitOutcome {
    fn from(account: &Account) -> Self {
        Self {
            visited_monasteries: account.visited.clone(),
            badges: account.badges.clone(),
            stats: account.stats,
        }
    }
}
