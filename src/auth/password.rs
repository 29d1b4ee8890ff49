//! # Password hashing and verification (bcrypt)
//!
//! [`PasswordHasher::hash`] salts every call, so hashing the same password
//! twice yields two different strings that both verify.
//! [`PasswordHasher::verify`] never errors: a malformed stored hash is treated
//! as a mismatch.

use anyhow::{Context, Result, anyhow};

/// Work factor for new hashes unless configured otherwise.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// Hashes and verifies passwords with a fixed bcrypt cost.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// # Errors
    /// Returns an error if `cost` is outside the range bcrypt accepts.
    pub fn new(cost: u32) -> Result<Self> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(anyhow!(
                "bcrypt cost must be between {} and {}, got {cost}",
                MIN_COST,
                MAX_COST
            ));
        }
        Ok(Self { cost })
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password, returning the modular-crypt string to store.
    ///
    /// # Errors
    /// Returns an error if bcrypt fails, which only happens on misconfiguration.
    pub fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost).context("failed to hash password")
    }

    /// Check a password against a stored hash in constant time.
    #[must_use]
    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        bcrypt::verify(password, password_hash).unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_BCRYPT_COST,
        }
    }
}
