// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Signed access tokens.
//!
//! Tokens are HS256 JWTs. The server verifies them with [`verify`]; the client
//! only needs the identity inside and reads it with [`decode_unverified`].

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity carried by an access token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// User id, carried as a string on the wire like any JWT subject.
    #[serde(with = "subject")]
    pub sub: i64,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_superadmin: bool,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// Superadmins implicitly hold the admin role.
    pub fn has_admin_role(&self) -> bool {
        self.is_admin || self.is_superadmin
    }
}

mod subject {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("invalid signing key")]
    InvalidKey,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidKeyFormat => TokenError::InvalidKey,
            _ => TokenError::Malformed,
        }
    }
}

/// Signs `claims` with `secret`.
pub fn encode(claims: &Claims, secret: &[u8]) -> Result<String, TokenError> {
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )?;
    Ok(token)
}

/// Checks the signature and expiry of `token`, returning its claims.
/// A token is expired once `now` reaches `exp`.
pub fn verify(token: &str, secret: &[u8], now: i64) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    // Expiry is checked against the caller's clock below.
    validation.validate_exp = false;

    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    if data.claims.exp <= now {
        return Err(TokenError::Expired);
    }
    Ok(data.claims)
}

/// Reads the claims without checking the signature or expiry.
pub fn decode_unverified(token: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: 3,
            email: "ada@example.com".to_string(),
            is_admin: true,
            is_superadmin: false,
            iat: 1_000,
            exp,
        }
    }

    #[test]
    fn test_verify_accepts_own_tokens() {
        let token = encode(&claims(2_000), SECRET).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(verify(&token, SECRET, 1_500).unwrap(), claims(2_000));
    }

    #[test]
    fn test_verify_rejects_wrong_secret_and_tampering() {
        let token = encode(&claims(2_000), SECRET).unwrap();
        assert_eq!(
            verify(&token, b"other-secret", 1_500),
            Err(TokenError::InvalidSignature)
        );

        let elevated = encode(
            &Claims {
                is_superadmin: true,
                ..claims(2_000)
            },
            b"attacker-secret",
        )
        .unwrap();
        let forged_claims = elevated.split('.').nth(1).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert_eq!(
            verify(&forged, SECRET, 1_500),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_subject_is_a_string_claim() {
        let token = encode(&claims(2_000), SECRET).unwrap();
        let other = encode(&Claims { sub: 42, ..claims(2_000) }, SECRET).unwrap();
        assert_ne!(token.split('.').nth(1), other.split('.').nth(1));
        assert_eq!(decode_unverified(&other).unwrap().sub, 42);

        let json = serde_json::to_value(claims(2_000)).unwrap();
        assert_eq!(json["sub"], "3");
    }

    #[test]
    fn test_verify_rejects_expired() {
        let token = encode(&claims(2_000), SECRET).unwrap();
        assert_eq!(verify(&token, SECRET, 2_000), Err(TokenError::Expired));
        assert_eq!(verify(&token, SECRET, 1_999).unwrap().exp, 2_000);
    }

    #[test]
    fn test_decode_unverified() {
        let token = encode(&claims(2_000), SECRET).unwrap();
        let decoded = decode_unverified(&token).unwrap();
        assert!(decoded.has_admin_role());
        assert_eq!(decoded.email, "ada@example.com");

        assert_eq!(decode_unverified("abc"), Err(TokenError::Malformed));
        assert_eq!(decode_unverified("a.b.c.d"), Err(TokenError::Malformed));
        assert_eq!(decode_unverified("a.!!!.c"), Err(TokenError::Malformed));
    }
}
