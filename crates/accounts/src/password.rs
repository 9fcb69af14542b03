//! Password hashing and verification using Argon2
//!
//! Uses the argon2id variant. The cost parameters are embedded in each PHC
//! string, so credentials hashed under an older cost keep verifying after the
//! configured cost changes.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use pilgrim_core::{DomainError, DomainResult};

/// Stored one-way hash of a password (PHC string).
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap an already-hashed PHC string (e.g. loaded from a backing store).
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Argon2 work factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashCost {
    /// Smallest cost argon2 accepts. Only for tests and benchmarks.
    pub const fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Slow, salted one-way hashing of passwords.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> DomainResult<Credential>;

    /// `Ok(false)` on mismatch; `Err` only if the stored credential is unreadable.
    fn verify(&self, password: &str, credential: &Credential) -> DomainResult<bool>;
}

impl<H> CredentialHasher for std::sync::Arc<H>
where
    H: CredentialHasher + ?Sized,
{
    fn hash(&self, password: &str) -> DomainResult<Credential> {
        (**self).hash(password)
    }

    fn verify(&self, password: &str, credential: &Credential) -> DomainResult<bool> {
        (**self).verify(password, credential)
    }
}

/// Argon2id hasher with a configurable cost.
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
    cost: HashCost,
}

impl core::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Argon2Hasher").field("cost", &self.cost).finish()
    }
}

impl Argon2Hasher {
    pub fn new(cost: HashCost) -> DomainResult<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| DomainError::validation(format!("invalid argon2 cost: {e}")))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            cost,
        })
    }

    pub fn cost(&self) -> HashCost {
        self.cost
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> DomainResult<Credential> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| Credential(hash.to_string()))
            .map_err(|e| DomainError::credential(format!("failed to hash password: {e}")))
    }

    fn verify(&self, password: &str, credential: &Credential) -> DomainResult<bool> {
        let parsed = PasswordHash::new(credential.as_phc())
            .map_err(|e| DomainError::credential(format!("invalid password hash format: {e}")))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(DomainError::credential(format!("failed to verify password: {e}"))),
        }
    }
}
