//! Signed bearer tokens (HS256) and random one-time tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// How long a bearer token stays valid.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// JWT claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn issue(&self, id: Uuid, email: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AppError::internal)
    }

    /// Check signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

/// 32 random bytes, hex encoded. Used for email verification and password reset.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let tokens = TokenService::new("secret");
        let id = Uuid::new_v4();
        let claims = tokens.verify(&tokens.issue(id, "a@example.com").unwrap()).unwrap();
        assert_eq!(claims.id, id);
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn test_rejects_foreign_signature_and_expiry() {
        let ours = TokenService::new("secret");
        let theirs = TokenService::new("other");
        let token = theirs.issue(Uuid::new_v4(), "a@example.com").unwrap();
        assert!(ours.verify(&token).is_err());

        let expired = Claims {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            iat: 0,
            exp: 1,
        };
        let token = encode(&Header::default(), &expired, &ours.encoding).unwrap();
        assert!(ours.verify(&token).is_err());
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, random_token());
    }
}
