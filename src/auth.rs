//! Identity verification
//!
//! The hub can accept `authenticate` events carrying a signed token instead
//! of a bare display name. Verification sits behind `IdentityVerifier`;
//! `JwtVerifier` checks HS256 tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Identity extracted from a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub avatar: Option<String>,
}

/// Verifies a client-supplied token
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AppError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub exp: usize, // Expiration time
}

/// HS256 token verifier with a shared secret
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::AuthFailed(e.to_string()))?;
        Ok(Identity {
            username: data.claims.username,
            avatar: data.claims.avatar,
        })
    }
}

/// Issue a token valid for 24 hours
pub fn issue_token(
    username: &str,
    avatar: Option<&str>,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        username: username.to_owned(),
        avatar: avatar.map(str::to_owned),
        exp: expiration.timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}
