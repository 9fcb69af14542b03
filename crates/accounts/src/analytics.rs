//! Read-only admin reports over a ledger snapshot.
//!
//! Everything here is a pure function of `&[AccountView]` (and a reference
//! date where time matters), so reports are deterministic under test.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use pilgrim_core::{AccountId, MonasteryId};

use crate::account::{AccountStats, AccountView};

const POPULAR_MONASTERIES: usize = 5;
const RECENT_ACCOUNTS: usize = 10;
const GROWTH_DAYS: i64 = 7;
const MAX_PAGE_SIZE: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Dashboard
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub total_users: usize,
    /// Accounts that logged in at least once.
    pub active_users: usize,
    pub total_visits: u64,
    /// Rounded to the nearest integer, halves up.
    pub average_visits_per_user: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonasteryPopularity {
    pub monastery_id: MonasteryId,
    /// Number of distinct accounts that visited.
    pub visits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentAccount {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
    pub badges: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub users: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub overview: Overview,
    pub popular_monasteries: Vec<MonasteryPopularity>,
    pub recent_accounts: Vec<RecentAccount>,
    pub user_growth: Vec<GrowthPoint>,
}

pub fn dashboard(accounts: &[AccountView], today: NaiveDate) -> Dashboard {
    Dashboard {
        overview: overview(accounts),
        popular_monasteries: popular_monasteries(accounts),
        recent_accounts: recent_accounts(accounts),
        user_growth: user_growth(accounts, today),
    }
}

fn overview(accounts: &[AccountView]) -> Overview {
    let total_users = accounts.len();
    let total_visits = accounts
        .iter()
        .map(|a| u64::from(a.stats.total_visits))
        .sum::<u64>();
    let average_visits_per_user = match total_users as u64 {
        0 => 0,
        n => (2 * total_visits + n) / (2 * n),
    };

    Overview {
        total_users,
        active_users: accounts.iter().filter(|a| a.stats.login_count > 0).count(),
        total_visits,
        average_visits_per_user,
    }
}

fn popular_monasteries(accounts: &[AccountView]) -> Vec<MonasteryPopularity> {
    let mut counts: HashMap<MonasteryId, usize> = HashMap::new();
    for id in accounts.iter().flat_map(|a| a.visited_monasteries.iter()) {
        *counts.entry(*id).or_default() += 1;
    }

    let mut ranked = counts
        .into_iter()
        .map(|(monastery_id, visits)| MonasteryPopularity { monastery_id, visits })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.visits.cmp(&a.visits).then(a.monastery_id.cmp(&b.monastery_id)));
    ranked.truncate(POPULAR_MONASTERIES);
    ranked
}

fn recent_accounts(accounts: &[AccountView]) -> Vec<RecentAccount> {
    let mut recent = accounts.iter().collect::<Vec<_>>();
    recent.sort_by(|a, b| b.joined_at.cmp(&a.joined_at).then(b.id.cmp(&a.id)));

    recent
        .into_iter()
        .take(RECENT_ACCOUNTS)
        .map(|a| RecentAccount {
            id: a.id,
            name: a.name.clone(),
            email: a.email.clone(),
            joined_at: a.joined_at,
            badges: a.badges.len(),
        })
        .collect()
}

/// Registrations per UTC day for the week ending `today`, oldest first.
fn user_growth(accounts: &[AccountView], today: NaiveDate) -> Vec<GrowthPoint> {
    (0..GROWTH_DAYS)
        .rev()
        .map(|days_ago| {
            let date = today - Duration::days(days_ago);
            let users = accounts
                .iter()
                .filter(|a| a.joined_at.date_naive() == date)
                .count();
            GrowthPoint { date, users }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Engagement
// ─────────────────────────────────────────────────────────────────────────────

/// Accounts bucketed by distinct monasteries visited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisitPatterns {
    pub no_visits: usize,
    /// 1–3
    pub low_visits: usize,
    /// 4–7
    pub medium_visits: usize,
    /// 8+
    pub high_visits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Engagement {
    pub total_users: usize,
    /// Accounts with at least one visit.
    pub active_users: usize,
    pub average_badges: f64,
    pub badge_distribution: BTreeMap<String, usize>,
    pub visit_patterns: VisitPatterns,
}

pub fn engagement(accounts: &[AccountView]) -> Engagement {
    let mut badge_distribution = BTreeMap::new();
    let mut visit_patterns = VisitPatterns::default();

    for account in accounts {
        for badge in &account.badges {
            *badge_distribution.entry(badge.clone()).or_insert(0) += 1;
        }
        match account.stats.total_visits {
            0 => visit_patterns.no_visits += 1,
            1..=3 => visit_patterns.low_visits += 1,
            4..=7 => visit_patterns.medium_visits += 1,
            _ => visit_patterns.high_visits += 1,
        }
    }

    let average_badges = if accounts.is_empty() {
        0.0
    } else {
        accounts.iter().map(|a| a.badges.len()).sum::<usize>() as f64 / accounts.len() as f64
    };

    Engagement {
        total_users: accounts.len(),
        active_users: accounts.iter().filter(|a| a.stats.total_visits > 0).count(),
        average_badges,
        badge_distribution,
        visit_patterns,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory search
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryQuery {
    /// 1-based.
    pub page: usize,
    pub limit: usize,
    pub search: Option<String>,
}

impl Default for DirectoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            search: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
    pub badges: Vec<String>,
    pub stats: AccountStats,
    pub visited_monasteries: usize,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryPage {
    pub items: Vec<DirectoryEntry>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Case-insensitive substring search on name or email, then paginate.
///
/// `page` below 1 is treated as 1; `limit` is clamped to 1..=100.
pub fn search(accounts: &[AccountView], query: &DirectoryQuery) -> DirectoryPage {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let matches = accounts
        .iter()
        .filter(|a| match &needle {
            Some(n) => a.name.to_lowercase().contains(n) || a.email.to_lowercase().contains(n),
            None => true,
        })
        .collect::<Vec<_>>();

    let total = matches.len();
    let items = matches
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .map(|a| DirectoryEntry {
            id: a.id,
            name: a.name.clone(),
            email: a.email.clone(),
            joined_at: a.joined_at,
            badges: a.badges.clone(),
            stats: a.stats,
            visited_monasteries: a.visited_monasteries.len(),
            is_admin: a.is_admin,
        })
        .collect();

    DirectoryPage {
        items,
        page,
        limit,
        total,
        total_pages: total.div_ceil(limit),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::account::Preferences;

    fn view(
        id: u64,
        name: &str,
        joined: DateTime<Utc>,
        visited: &[u64],
        logins: u32,
    ) -> AccountView {
        let visited = visited.iter().copied().map(MonasteryId::new).collect::<Vec<_>>();
        AccountView {
            id: AccountId::new(id),
            name: name.to_string(),
            email: format!("{}@x.com", name.to_lowercase()),
            badges: vec!["New Explorer".to_string()],
            stats: AccountStats {
                total_visits: visited.len() as u32,
                login_count: logins,
                ..Default::default()
            },
            visited_monasteries: visited,
            preferences: Preferences::default(),
            joined_at: joined,
            is_admin: false,
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, 12, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn empty_ledger_reports_zeroes() {
        let d = dashboard(&[], today());
        assert_eq!(d.overview.total_users, 0);
        assert_eq!(d.overview.average_visits_per_user, 0);
        assert!(d.popular_monasteries.is_empty());
        assert_eq!(d.user_growth.len(), 7);

        let e = engagement(&[]);
        assert_eq!(e.average_badges, 0.0);
    }

    #[test]
    fn overview_counts_and_rounds() {
        let accounts = vec![
            view(1, "Alice", day(19), &[1, 2, 3], 2),
            view(2, "Bob", day(18), &[1, 2], 0),
        ];
        let o = dashboard(&accounts, today()).overview;
        assert_eq!(o.total_users, 2);
        assert_eq!(o.active_users, 1);
        assert_eq!(o.total_visits, 5);
        // 2.5 rounds up
        assert_eq!(o.average_visits_per_user, 3);
    }

    #[test]
    fn popular_monasteries_rank_by_visitors_then_id() {
        let accounts = vec![
            view(1, "Alice", day(19), &[7, 3, 9], 0),
            view(2, "Bob", day(19), &[3, 9], 0),
            view(3, "Carol", day(19), &[3, 1, 2, 4, 5], 0),
        ];
        let ranked = dashboard(&accounts, today())
            .popular_monasteries
            .into_iter()
            .map(|p| (p.monastery_id.get(), p.visits))
            .collect::<Vec<_>>();
        assert_eq!(ranked, vec![(3, 3), (9, 2), (1, 1), (2, 1), (4, 1)]);
    }

    #[test]
    fn recent_accounts_and_growth() {
        let accounts = vec![
            view(1, "Alice", day(10), &[], 0),
            view(2, "Bob", day(17), &[], 0),
            view(3, "Carol", day(19), &[], 0),
            view(4, "Dan", day(19), &[], 0),
        ];
        let d = dashboard(&accounts, today());

        let ids = d.recent_accounts.iter().map(|r| r.id.get()).collect::<Vec<_>>();
        assert_eq!(ids, vec![4, 3, 2, 1]);

        let growth = d.user_growth.iter().map(|g| g.users).collect::<Vec<_>>();
        assert_eq!(growth, vec![0, 0, 0, 0, 1, 0, 2]);
        assert_eq!(d.user_growth[0].date, NaiveDate::from_ymd_opt(2026, 10, 13).unwrap());
    }

    #[test]
    fn engagement_buckets_visits_and_counts_badges() {
        let mut seasoned = view(3, "Carol", day(1), &[1, 2, 3, 4, 5, 6, 7, 8], 1);
        seasoned.badges.push("First Steps".to_string());

        let accounts = vec![
            view(1, "Alice", day(1), &[], 0),
            view(2, "Bob", day(1), &[1, 2, 3, 4], 0),
            seasoned,
        ];
        let e = engagement(&accounts);

        assert_eq!(e.active_users, 2);
        assert_eq!(
            e.visit_patterns,
            VisitPatterns { no_visits: 1, low_visits: 0, medium_visits: 1, high_visits: 1 }
        );
        assert_eq!(e.badge_distribution["New Explorer"], 3);
        assert_eq!(e.badge_distribution["First Steps"], 1);
        assert!((e.average_badges - 4.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn search_filters_case_insensitively_and_paginates() {
        let accounts = (1..=25)
            .map(|i| view(i, &format!("Pilgrim{i}"), day(1), &[], 0))
            .chain(std::iter::once(view(26, "Tenzin", day(1), &[1], 0)))
            .collect::<Vec<_>>();

        let page = search(
            &accounts,
            &DirectoryQuery {
                page: 2,
                limit: 10,
                search: Some("PILGRIM".into()),
            },
        );
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.first().map(|e| e.id.get()), Some(11));
        assert_eq!(page.items.len(), 10);

        let tenzin = search(
            &accounts,
            &DirectoryQuery {
                search: Some("tenzin@".into()),
                ..Default::default()
            },
        );
        assert_eq!(tenzin.total, 1);
        assert_eq!(tenzin.items[0].visited_monasteries, 1);

        let clamped = search(&accounts, &DirectoryQuery { page: 0, limit: 0, search: None });
        assert_eq!((clamped.page, clamped.limit, clamped.items.len()), (1, 1, 1));
    }
}
