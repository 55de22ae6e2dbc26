use crate::jwt::TokenType;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
    #[error("expected an {expected} token")]
    WrongTokenType { expected: TokenType },
    #[error("token encoding failed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("{name} must be between 1 and 31622400 seconds, got {secs}")]
    InvalidTtl { name: &'static str, secs: u64 },
}

pub type Result<T, E = AuthError> = std::result::Result<T, E>;
