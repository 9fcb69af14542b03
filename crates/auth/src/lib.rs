//! `pilgrim-auth` — bearer token boundary.
//!
//! Issues and verifies signed, time-limited tokens carrying an account id and
//! email. The ledger never sees tokens; this crate never sees credentials.

pub mod claims;
pub mod token;

pub use claims::{AccountClaims, TokenValidationError, validate_claims};
pub use token::{Hs256Jwt, JwtIssuer, JwtValidator, TokenError};
