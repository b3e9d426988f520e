#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

#[cfg(feature = "api")]
pub mod api;

pub mod db;

use actix_web::{FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized, http};
use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use futures_util::future::{Ready, err, ok};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cookie carrying the session token for browser clients.
pub const TOKEN_COOKIE: &str = "lp_token";
/// Cookie carrying the OAuth `state` value during an authorization round-trip.
pub const STATE_COOKIE: &str = "lp_state";

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 604_800;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to hash password")]
    HashPassword,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Unauthorized")]
    Unauthorized,
}

/// Claims carried by a LovePing session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// The identity of an authenticated user, decoded from a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: u64,
    pub username: String,
}

fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "CHANGE_ME__SET_JWT_SECRET".to_string())
}

fn token_ttl_seconds() -> i64 {
    std::env::var("JWT_TTL_SECONDS")
        .ok()
        .and_then(|x| x.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS)
}

/// Hashes a password for storage.
///
/// # Errors
///
/// * If the hash fails to compute
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::HashPassword)?
        .to_string())
}

/// Verifies a password against a stored hash.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Issues a session token for the user.
///
/// # Errors
///
/// * If the token fails to encode
pub fn create_token(user_id: u64, username: &str) -> Result<String, AuthError> {
    create_token_with_secret(&jwt_secret(), token_ttl_seconds(), user_id, username)
}

fn create_token_with_secret(
    secret: &str,
    ttl_seconds: i64,
    user_id: u64,
    username: &str,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        iat: now,
        exp: now + ttl_seconds,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Decodes and validates a session token.
///
/// # Errors
///
/// * [`AuthError::Unauthorized`] if the token is invalid or expired
pub fn read_token(token: &str) -> Result<UserIdentity, AuthError> {
    read_token_with_secret(&jwt_secret(), token)
}

fn read_token_with_secret(secret: &str, token: &str) -> Result<UserIdentity, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AuthError::Unauthorized)?;

    let user_id = data
        .claims
        .sub
        .parse::<u64>()
        .map_err(|_| AuthError::Unauthorized)?;

    Ok(UserIdentity {
        user_id,
        username: data.claims.username,
    })
}

fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(auth) = req.headers().get(http::header::AUTHORIZATION)
        && let Ok(auth) = auth.to_str()
        && let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
    {
        return Some(token.trim().to_string());
    }

    req.cookie(TOKEN_COOKIE).map(|c| c.value().to_string())
}

impl FromRequest for UserIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, actix_web::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let identity =
            token_from_request(req).map_or(Err(AuthError::Unauthorized), |x| read_token(&x));

        match identity {
            Ok(identity) => ok(identity),
            Err(_) => {
                log::warn!("Unauthorized request to '{}'", req.path());
                err(ErrorUnauthorized("Unauthorized"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("hunter22").unwrap();

        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn test_verify_password_rejects_malformed_hash() {
        assert!(!verify_password("hunter22", "not-a-phc-string"));
    }

    #[test]
    fn test_token_round_trip() {
        let token = create_token_with_secret(SECRET, 3600, 42, "alice").unwrap();
        let identity = read_token_with_secret(SECRET, &token).unwrap();

        assert_eq!(
            identity,
            UserIdentity {
                user_id: 42,
                username: "alice".to_string(),
            }
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        // jsonwebtoken's default validation allows 60 seconds of leeway
        let token = create_token_with_secret(SECRET, -120, 42, "alice").unwrap();

        assert!(matches!(
            read_token_with_secret(SECRET, &token),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn test_token_with_wrong_secret_rejected() {
        let token = create_token_with_secret(SECRET, 3600, 42, "alice").unwrap();

        assert!(matches!(
            read_token_with_secret("other-secret", &token),
            Err(AuthError::Unauthorized)
        ));
    }
}
