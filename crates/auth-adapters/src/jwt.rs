//! # JWT bearer verification
//!
//! Validates HS256 tokens minted by the identity service and extracts the
//! caller's user id from the `sub` claim. This adapter never issues tokens.

use domains::{AuthError, TokenVerifier};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: u64,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// `issuer`, when set, must match the token's `iss` claim.
    pub fn new(secret: &[u8], issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::Missing);
        }

        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => {
                tracing::debug!(error = %e, "rejected bearer token");
                AuthError::Invalid(e.to_string())
            }
        })?;

        Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::Invalid("subject is not a user id".into()))
    }
}
