//! HTTP API endpoints for account registration and login.
//!
//! # Endpoints
//!
//! * `POST /register` - Create an account and receive a session token
//! * `POST /login` - Exchange credentials for a session token

use actix_web::{
    Result, Scope,
    dev::{ServiceFactory, ServiceRequest},
    error::{ErrorBadRequest, ErrorConflict, ErrorInternalServerError, ErrorUnauthorized},
    route,
    web::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{create_token, db, hash_password, verify_password};

/// Binds the account endpoints to an Actix-web scope.
#[must_use]
pub fn bind_services<
    T: ServiceFactory<ServiceRequest, Config = (), Error = actix_web::Error, InitError = ()>,
>(
    scope: Scope<T>,
) -> Scope<T> {
    scope.service(register_endpoint).service(login_endpoint)
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
}

/// Endpoint to create a new account.
///
/// Usernames are trimmed and lowercased; 3 to 32 characters. Passwords
/// must be at least 6 characters.
///
/// # Errors
///
/// * 400 if the username or password is out of bounds
/// * 409 if the username is taken
#[route("/register", method = "POST")]
pub async fn register_endpoint(body: Json<RegisterRequest>) -> Result<Json<Value>> {
    let username = body.username.trim().to_lowercase();

    if username.len() < 3 || username.len() > 32 || body.password.len() < 6 {
        return Err(ErrorBadRequest("invalid_input"));
    }

    let existing = db::get_user_by_username(&username).map_err(|e| {
        log::error!("Failed to look up user: {e:?}");
        ErrorInternalServerError("Failed to look up user")
    })?;

    if existing.is_some() {
        return Err(ErrorConflict("user_exists"));
    }

    let pass_hash = hash_password(&body.password).map_err(|e| {
        log::error!("Failed to hash password: {e:?}");
        ErrorInternalServerError("Failed to hash password")
    })?;

    let user = db::create_user(&username, &pass_hash).map_err(|e| {
        log::error!("Failed to create user: {e:?}");
        ErrorInternalServerError("Failed to create user")
    })?;

    let token = create_token(user.id, &user.username).map_err(|e| {
        log::error!("Failed to create token: {e:?}");
        ErrorInternalServerError("Failed to create token")
    })?;

    log::info!("Registered user {}", user.username);

    Ok(Json(json!({
        "token": token,
        "username": user.username,
    })))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

/// Endpoint to exchange credentials for a session token.
///
/// # Errors
///
/// * 401 if the username or password is wrong
#[route("/login", method = "POST")]
pub async fn login_endpoint(body: Json<LoginRequest>) -> Result<Json<Value>> {
    let username = body.username.trim().to_lowercase();

    let user = db::get_user_by_username(&username).map_err(|e| {
        log::error!("Failed to look up user: {e:?}");
        ErrorInternalServerError("Failed to look up user")
    })?;

    let Some(user) = user else {
        return Err(ErrorUnauthorized("invalid_credentials"));
    };

    if !verify_password(&body.password, &user.pass_hash) {
        return Err(ErrorUnauthorized("invalid_credentials"));
    }

    let token = create_token(user.id, &user.username).map_err(|e| {
        log::error!("Failed to create token: {e:?}");
        ErrorInternalServerError("Failed to create token")
    })?;

    Ok(Json(json!({
        "token": token,
        "username": user.username,
        "spotifyLinked": user.spotify_refresh.is_some(),
    })))
}
