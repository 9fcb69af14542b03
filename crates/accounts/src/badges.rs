//! Badge thresholds.
//!
//! A single [`BadgeTable`] value decides which badge a visit count unlocks.
//! Every call site goes through it; there is no second table anywhere.

use std::borrow::Cow;
use std::str::FromStr;

use pilgrim_core::{DomainError, DomainResult};

/// Granted at registration; never revoked.
pub const DEFAULT_BADGE: &str = "New Explorer";

/// One row of a badge table: reaching exactly `visits` distinct monasteries
/// grants `badge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeThreshold {
    pub visits: u32,
    pub badge: Cow<'static, str>,
}

impl BadgeThreshold {
    pub const fn fixed(visits: u32, badge: &'static str) -> Self {
        Self {
            visits,
            badge: Cow::Borrowed(badge),
        }
    }
}

/// Ordered, validated set of thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeTable {
    thresholds: Vec<BadgeThreshold>,
}

impl BadgeTable {
    /// 1 → "First Steps", 5 → "Explorer", 10 → "Heritage Master".
    pub fn canonical() -> Self {
        Self {
            thresholds: vec![
                BadgeThreshold::fixed(1, "First Steps"),
                BadgeThreshold::fixed(5, "Explorer"),
                BadgeThreshold::fixed(10, "Heritage Master"),
            ],
        }
    }

    /// The four-tier variant: adds "Culture Seeker" at 5 and moves "Explorer" to 3.
    pub fn extended() -> Self {
        Self {
            thresholds: vec![
                BadgeThreshold::fixed(1, "First Steps"),
                BadgeThreshold::fixed(3, "Explorer"),
                BadgeThreshold::fixed(5, "Culture Seeker"),
                BadgeThreshold::fixed(10, "Heritage Master"),
            ],
        }
    }

    /// Build a custom table.
    ///
    /// Thresholds must be positive, and neither visit counts nor badge names
    /// may repeat. The default badge cannot be re-granted by a threshold.
    pub fn new(thresholds: impl IntoIterator<Item = BadgeThreshold>) -> DomainResult<Self> {
        let mut thresholds = thresholds.into_iter().collect::<Vec<_>>();
        thresholds.sort_by_key(|t| t.visits);

        for (i, t) in thresholds.iter().enumerate() {
            if t.visits == 0 {
                return Err(DomainError::validation("badge threshold must be at least 1 visit"));
            }
            if t.badge.trim().is_empty() {
                return Err(DomainError::validation("badge name cannot be empty"));
            }
            if t.badge == DEFAULT_BADGE {
                return Err(DomainError::validation(format!(
                    "'{DEFAULT_BADGE}' is granted at registration"
                )));
            }
            let earlier = &thresholds[..i];
            if earlier.iter().any(|e| e.visits == t.visits) {
                return Err(DomainError::validation(format!(
                    "duplicate badge threshold at {} visits",
                    t.visits
                )));
            }
            if earlier.iter().any(|e| e.badge == t.badge) {
                return Err(DomainError::validation(format!("duplicate badge '{}'", t.badge)));
            }
        }

        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &[BadgeThreshold] {
        &self.thresholds
    }

    /// Badges unlocked by reaching exactly `total_visits`.
    pub fn badges_for(&self, total_visits: u32) -> impl Iterator<Item = &str> + '_ {
        self.thresholds
            .iter()
            .filter(move |t| t.visits == total_visits)
            .map(|t| t.badge.as_ref())
    }
}

impl Default for BadgeTable {
    fn default() -> Self {
        Self::canonical()
    }
}

impl FromStr for BadgeTable {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "canonical" => Ok(Self::canonical()),
            "extended" => Ok(Self::extended()),
            other => Err(DomainError::validation(format!(
                "unknown badge table '{other}' (expected: canonical, extended)"
            ))),
        }
    }
}
