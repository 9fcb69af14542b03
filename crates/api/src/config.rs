//! Process configuration from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `JWT_SECRET` | insecure dev value (warns) |
//! | `TOKEN_TTL_HOURS` | `168` |
//! | `BADGE_TABLE` | `canonical` (or `extended`) |
//! | `EMAIL_POLICY` | `exact` (or `case-insensitive`) |
//! | `PASSWORD_MIN_LEN` | `6` |
//! | `KNOWN_MONASTERIES` | unset: any positive id (else comma-separated ids) |
//! | `ARGON2_MEMORY_KIB` / `ARGON2_ITERATIONS` / `ARGON2_PARALLELISM` | argon2 defaults |
//! | `ADMIN_NAME` / `ADMIN_EMAIL` / `ADMIN_PASSWORD` | unset: no admin bootstrap |
//! | `AUTH_RATE_LIMIT` | `10` requests per client IP on `/api/auth/*` (`0` disables) |
//! | `AUTH_RATE_WINDOW_SECS` | `900` |

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use pilgrim_accounts::{BadgeTable, EmailPolicy, HashCost, LedgerConfig};
use pilgrim_core::MonasteryId;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),
}

/// Account created and promoted to admin at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Per-client budget for the `/api/auth/*` routes: `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRateLimit {
    pub max_requests: NonZeroU32,
    pub window: Duration,
}

impl Default for AuthRateLimit {
    fn default() -> Self {
        Self {
            max_requests: NonZeroU32::MIN.saturating_add(9),
            window: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub hash_cost: HashCost,
    pub ledger: LedgerConfig,
    pub admin: Option<AdminBootstrap>,
    pub auth_rate_limit: Option<AuthRateLimit>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let ttl_hours: i64 = parse_or(&get, "TOKEN_TTL_HOURS", 7 * 24)?;
        if ttl_hours <= 0 {
            return Err(invalid("TOKEN_TTL_HOURS", "must be positive"));
        }

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parse_or(&get, "ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&get, "ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&get, "ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        let min_password_len: usize = parse_or(&get, "PASSWORD_MIN_LEN", 6)?;
        if min_password_len == 0 {
            return Err(invalid("PASSWORD_MIN_LEN", "must be at least 1"));
        }

        let known_monasteries = get("KNOWN_MONASTERIES")
            .map(|raw| parse_monastery_set(&raw))
            .transpose()?;

        let ledger = LedgerConfig {
            badges: parse_or(&get, "BADGE_TABLE", BadgeTable::canonical())?,
            email_policy: parse_or(&get, "EMAIL_POLICY", EmailPolicy::Exact)?,
            min_password_len,
            known_monasteries,
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
                email,
                password,
            }),
            (Some(_), None) => return Err(ConfigError::Incomplete("ADMIN_EMAIL", "ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Incomplete("ADMIN_PASSWORD", "ADMIN_EMAIL")),
            (None, None) => None,
        };

        let rate_defaults = AuthRateLimit::default();
        let max_requests: u32 =
            parse_or(&get, "AUTH_RATE_LIMIT", rate_defaults.max_requests.get())?;
        let window_secs: u64 =
            parse_or(&get, "AUTH_RATE_WINDOW_SECS", rate_defaults.window.as_secs())?;
        if window_secs == 0 {
            return Err(invalid("AUTH_RATE_WINDOW_SECS", "must be positive"));
        }
        let auth_rate_limit = NonZeroU32::new(max_requests).map(|max_requests| AuthRateLimit {
            max_requests,
            window: Duration::from_secs(window_secs),
        });

        Ok(Self {
            bind_addr,
            jwt_secret,
            token_ttl: chrono::Duration::hours(ttl_hours),
            hash_cost,
            ledger,
            admin,
            auth_rate_limit,
        })
    }
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn parse_monastery_set(raw: &str) -> Result<BTreeSet<MonasteryId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<MonasteryId>()
                .map_err(|e| invalid("KNOWN_MONASTERIES", e.to_string()))
        })
        .collect()
}
