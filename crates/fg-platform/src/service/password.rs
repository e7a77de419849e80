//! Password Service
//!
//! Argon2id hashing, password policy and email syntax checks for the
//! email + password flows.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use regex::Regex;

use crate::error::{PlatformError, Result};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy)]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl Argon2Config {
    /// Minimal cost, for tests only
    pub fn low_cost() -> Self {
        Self {
            memory_kib: 1_024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 64,
        }
    }
}

impl PasswordPolicy {
    pub fn validate(&self, password: &str) -> Result<()> {
        let length = password.chars().count();
        if length < self.min_length || length > self.max_length {
            return Err(PlatformError::validation(format!(
                "Password must be between {} and {} characters",
                self.min_length, self.max_length
            )));
        }
        Ok(())
    }
}

pub struct PasswordService {
    policy: PasswordPolicy,
    argon2: Argon2<'static>,
    email_pattern: Regex,
}

impl PasswordService {
    pub fn new(policy: PasswordPolicy, config: Argon2Config) -> Result<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| PlatformError::internal(format!("Invalid Argon2 parameters: {}", e)))?;
        let email_pattern = Regex::new(EMAIL_PATTERN)
            .map_err(|e| PlatformError::internal(format!("Invalid email pattern: {}", e)))?;

        Ok(Self {
            policy,
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            email_pattern,
        })
    }

    pub fn validate_email(&self, email: &str) -> Result<()> {
        if self.email_pattern.is_match(email.trim()) {
            Ok(())
        } else {
            Err(PlatformError::validation(format!("Invalid email address: {}", email)))
        }
    }

    /// Check the policy, then hash to a PHC string
    pub fn hash_password(&self, password: &str) -> Result<String> {
        self.policy.validate(password)?;
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PlatformError::internal(format!("Password hashing failed: {}", e)))?;
        Ok(hash.to_string())
    }

    /// `Ok(false)` on mismatch; malformed stored hashes are internal errors
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| PlatformError::internal(format!("Stored password hash is invalid: {}", e)))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PlatformError::internal(format!("Password verification failed: {}", e))),
        }
    }
}
