use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, Identity, Role};
use crate::config::JwtConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("token expired")]
    Expired,
    #[error("token missing subject or id")]
    Malformed,
}

/// HS256 signing and verification keys plus the access-token lifetime.
/// Built once from config and shared read-only.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, subject: &str, user_id: i64, role: Role) -> anyhow::Result<String> {
        self.issue_at(subject, user_id, role, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        user_id: i64,
        role: Role,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let claims = Claims {
            sub: Some(subject.to_string()),
            id: Some(user_id),
            role,
            exp: (now + self.ttl()).unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id, role = %role, "jwt signed");
        Ok(token)
    }

    pub fn resolve(&self, token: &str) -> Result<Identity, TokenError> {
        self.resolve_at(token, OffsetDateTime::now_utc())
    }

    /// Verify signature, then expiry against `now`, then required claims.
    /// A token is valid strictly before its `exp` second.
    pub fn resolve_at(&self, token: &str, now: OffsetDateTime) -> Result<Identity, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the caller's clock, without leeway.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if now.unix_timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        let (Some(username), Some(id)) = (claims.sub, claims.id) else {
            return Err(TokenError::Malformed);
        };
        debug!(user_id = id, "jwt verified");
        Ok(Identity {
            username,
            id,
            role: claims.role,
        })
    }
}
