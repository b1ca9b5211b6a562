use std::{error::Error as StdError, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

/// Deployment environment; controls the `Secure` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

/// Argon2 work factor. Read once at startup.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HashConfig {
    pub iterations: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            iterations: 2,
            memory_kib: 19 * 1024,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
    pub environment: Environment,
    pub store_timeout_ms: u64,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests never touch the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} must be set"));

        let jwt = JwtConfig {
            access_secret: required("JWT_ACCESS_SECRET")?,
            refresh_secret: required("JWT_REFRESH_SECRET")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "authkeep".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "authkeep-users".into()),
            access_ttl_secs: parsed(&lookup, "JWT_ACCESS_TTL_SECS", 15 * 60)?,
            refresh_ttl_secs: parsed(&lookup, "JWT_REFRESH_TTL_SECS", 60 * 60 * 24 * 30)?,
        };

        let defaults = HashConfig::default();
        let hash = HashConfig {
            iterations: parsed(&lookup, "HASH_ITERATIONS", defaults.iterations)?,
            memory_kib: parsed(&lookup, "HASH_MEMORY_KIB", defaults.memory_kib)?,
            parallelism: parsed(&lookup, "HASH_PARALLELISM", defaults.parallelism)?,
        };

        let environment = match lookup("APP_ENV").as_deref() {
            None | Some("development") => Environment::Development,
            Some("production") => Environment::Production,
            Some(other) => anyhow::bail!("APP_ENV must be development or production, got {other}"),
        };

        let config = Self {
            database_url: required("DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
            jwt,
            hash,
            environment,
            store_timeout_ms: parsed(&lookup, "STORE_TIMEOUT_MS", 5_000)?,
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&lookup, "APP_PORT", 8080)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.access_secret.is_empty() || self.jwt.refresh_secret.is_empty() {
            anyhow::bail!("jwt secrets must not be empty");
        }
        if self.jwt.access_secret == self.jwt.refresh_secret {
            anyhow::bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ");
        }
        if self.jwt.access_ttl_secs <= 0 || self.jwt.refresh_ttl_secs <= 0 {
            anyhow::bail!("token lifetimes must be positive");
        }
        if self.hash.iterations == 0 || self.hash.parallelism == 0 {
            anyhow::bail!("hash work factor must be positive");
        }
        if self.store_timeout_ms == 0 {
            anyhow::bail!("STORE_TIMEOUT_MS must be positive");
        }
        Ok(())
    }
}

/// Parses `key` straight into its target type; out-of-range values are errors, never wrapped.
fn parsed<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} is not a valid value: {v}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/auth"),
        ("JWT_ACCESS_SECRET", "access"),
        ("JWT_REFRESH_SECRET", "refresh"),
    ];

    #[test]
    fn defaults_are_applied() {
        let cfg = AppConfig::from_lookup(lookup_from(BASE)).expect("config");
        assert_eq!(cfg.jwt.refresh_ttl_secs, 2_592_000);
        assert_eq!(cfg.jwt.access_ttl_secs, 900);
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.store_timeout_ms, 5_000);
    }

    #[test]
    fn rejects_identical_secrets() {
        let pairs = [
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("JWT_ACCESS_SECRET", "same"),
            ("JWT_REFRESH_SECRET", "same"),
        ];
        let err = AppConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let pairs = [("DATABASE_URL", "postgres://localhost/auth")];
        let err = AppConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("JWT_ACCESS_SECRET"));
    }

    #[test]
    fn production_flag_is_parsed() {
        let mut pairs = BASE.to_vec();
        pairs.push(("APP_ENV", "production"));
        let cfg = AppConfig::from_lookup(lookup_from(&pairs)).expect("config");
        assert!(cfg.environment.is_production());

        let mut bad = BASE.to_vec();
        bad.push(("APP_ENV", "staging"));
        assert!(AppConfig::from_lookup(lookup_from(&bad)).is_err());
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        let mut port = BASE.to_vec();
        port.push(("APP_PORT", "70000"));
        let err = AppConfig::from_lookup(lookup_from(&port)).unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));

        let mut negative = BASE.to_vec();
        negative.push(("STORE_TIMEOUT_MS", "-1"));
        let err = AppConfig::from_lookup(lookup_from(&negative)).unwrap_err();
        assert!(err.to_string().contains("STORE_TIMEOUT_MS"));

        let mut zero = BASE.to_vec();
        zero.push(("STORE_TIMEOUT_MS", "0"));
        let err = AppConfig::from_lookup(lookup_from(&zero)).unwrap_err();
        assert!(err.to_string().contains("STORE_TIMEOUT_MS"));

        let mut wide = BASE.to_vec();
        wide.push(("HASH_MEMORY_KIB", "5000000000"));
        assert!(AppConfig::from_lookup(lookup_from(&wide)).is_err());
    }
}
