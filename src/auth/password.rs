use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::{config::HashConfig, errors::AuthError, response::ErrorDetail};

const PASSWORD_SYMBOLS: &str = "!@#$%^&*";
const MIN_PASSWORD_LEN: usize = 6;

/// Argon2id hasher with a process-wide work factor.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(cfg: HashConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_blocking(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// The hash string carries its own parameters, so older hashes keep verifying
    /// after the work factor changes.
    pub fn verify_blocking(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Hashes on the blocking pool so request tasks keep moving.
    pub async fn hash(&self, plain: String) -> Result<String, AuthError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&plain))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("hash task: {e}")))?
            .map_err(AuthError::Internal)
    }

    pub async fn verify(&self, plain: String, hash: String) -> Result<bool, AuthError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&plain, &hash))
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("verify task: {e}")))?
            .map_err(AuthError::Internal)
    }
}

/// Checks the password policy and reports every failed rule.
pub fn check_password_strength(password: &str, field: &str) -> Result<(), AuthError> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push("Password must contain at least 6 characters");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("Password must contain at least 1 lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("Password must contain at least 1 uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain at least 1 number");
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        problems.push("Password must contain at least 1 special character (!@#$%^&*)");
    }
    if password
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c)))
    {
        problems.push("Password may only contain letters, digits and !@#$%^&*");
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AuthError::WeakPassword(
            problems
                .into_iter()
                .map(|m| ErrorDetail::field(field, m))
                .collect(),
        ))
    }
}
