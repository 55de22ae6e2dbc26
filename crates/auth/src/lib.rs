pub mod error;
pub mod jwt;
pub mod password;

pub use error::{AuthError, Result};
pub use jwt::{Claims, TokenIssuer, TokenPair, TokenType};
pub use password::{hash_password, verify_password};
