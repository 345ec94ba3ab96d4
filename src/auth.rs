//! JWT access token issuance and verification (HS256, shared secret).

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token has expired")]
    TokenExpired,
    #[error("invalid token: {0}")]
    TokenInvalid(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
}

/// Claims embedded in every access token. Stateless by design: the
/// middleware never touches the database to authenticate a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — customer email.
    pub sub: String,
    /// Customer ID.
    pub uid: i32,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

pub fn issue_token(customer_id: i32, email: &str, secret: &str) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: email.to_string(),
        uid: customer_id,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["sub", "exp", "iat"]);

    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(e.to_string()),
    })
}

/// The authenticated caller, inserted into request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.uid,
            email: claims.sub,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_tokens_verify_and_carry_identity() {
        let token = issue_token(42, "alice@example.com", SECRET).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.uid, 42);
        assert_eq!(claims.sub, "alice@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert!(matches!(
            verify_token("not.a.jwt", SECRET),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn tokens_signed_with_a_different_secret_are_rejected() {
        let token = issue_token(1, "alice@example.com", "other-secret").unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }
}
