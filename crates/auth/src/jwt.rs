use std::fmt;

use chrono::{DateTime, Duration, Utc};
use common::config::AuthConfig;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AuthError, Result};

/// One year; longer lifetimes are treated as misconfiguration.
pub const MAX_TTL_SECS: u64 = 366 * 24 * 60 * 60;

fn ttl(name: &'static str, secs: u64) -> Result<Duration> {
    if secs == 0 || secs > MAX_TTL_SECS {
        return Err(AuthError::InvalidTtl { name, secs });
    }
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or(AuthError::InvalidTtl { name, secs })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Signs and checks HS256 tokens. Cheap to clone; keys are derived once.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Fails when a configured lifetime is zero or longer than [`MAX_TTL_SECS`].
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Ok(Self::new(
            config.jwt_secret.as_bytes(),
            ttl("auth.access_ttl_secs", config.access_ttl_secs)?,
            ttl("auth.refresh_ttl_secs", config.refresh_ttl_secs)?,
        ))
    }

    pub fn issue_pair(&self, user_id: i64, username: &str) -> Result<TokenPair> {
        let now = Utc::now();
        Ok(TokenPair {
            refresh: self.issue_at(TokenType::Refresh, user_id, username, now)?,
            access: self.issue_at(TokenType::Access, user_id, username, now)?,
        })
    }

    /// Exchanges a refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self.verify(refresh_token, TokenType::Refresh)?;
        self.issue_at(TokenType::Access, claims.user_id, &claims.username, Utc::now())
    }

    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(err),
            })?;

        if claims.token_type != expected {
            debug!(got = %claims.token_type, %expected, "token type mismatch");
            return Err(AuthError::WrongTokenType { expected });
        }
        Ok(claims)
    }

    fn issue_at(
        &self,
        token_type: TokenType,
        user_id: i64,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            token_type,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
            user_id,
            username: username.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Encode)
    }
}
