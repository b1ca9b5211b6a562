use std::time::Duration;

use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, errors::AuthError};

/// Signing and verification keys for one token kind.
#[derive(Clone)]
struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KindKeys {
    fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs(ttl_secs.max(0) as u64),
        }
    }
}

/// Issues and verifies access/refresh JWTs. Each kind has its own secret.
#[derive(Clone)]
pub struct JwtKeys {
    access: KindKeys,
    refresh: KindKeys,
    issuer: String,
    audience: String,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            access: KindKeys::new(&cfg.access_secret, cfg.access_ttl_secs),
            refresh: KindKeys::new(&cfg.refresh_secret, cfg.refresh_ttl_secs),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens of the given kind.
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        self.keys(kind).ttl
    }

    fn sign_with_kind(&self, user_id: Uuid, kind: TokenKind) -> Result<String, AuthError> {
        let keys = self.keys(kind);
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(keys.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("jwt encode: {e}")))?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.sign_with_kind(user_id, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.sign_with_kind(user_id, TokenKind::Refresh)
    }

    fn validation(&self, check_exp: bool) -> Validation {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.validate_exp = check_exp;
        if !check_exp {
            validation.required_spec_claims.remove("exp");
        }
        validation
    }

    fn decode_kind(&self, token: &str, kind: TokenKind, check_exp: bool) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation(check_exp))
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?;
        if data.claims.kind != kind {
            return Err(AuthError::TokenInvalid);
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    /// Full verification: signature, issuer, audience, kind and expiry.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        self.decode_kind(token, kind, true)
    }

    /// Signature, issuer, audience and kind only; an expired token still passes.
    pub fn verify_allow_expired(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        self.decode_kind(token, kind, false)
    }
}
