//! Bearer token codec
//!
//! Thin wrapper around a signed-token format (JWT, HS256, shared secret).
//! The engine only needs two operations: prove a subject id from a
//! presented token, and mint a token for a subject. Key material comes from
//! configuration; the algorithm is fixed.

use crate::error::TokenError;
use crate::util::SecretString;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Claims carried by a stagepass bearer token
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject id
    sub: i64,
    /// Expiry, seconds since the epoch
    exp: i64,
    /// Issued at, seconds since the epoch
    iat: i64,
}

/// Token codec over a shared signing secret
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec from the configured signing secret.
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            validation,
        }
    }

    /// Verify a presented token and return the subject id it proves.
    pub fn verify(&self, token: &str) -> Result<i64, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// Issue a token for `subject_id` valid for `ttl_minutes`.
    pub fn issue(&self, subject_id: i64, ttl_minutes: i64) -> Result<String, TokenError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: subject_id,
            exp: (now + chrono::Duration::minutes(ttl_minutes)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Issue(e.to_string()))
    }
}
