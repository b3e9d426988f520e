//! HTTP API endpoints for Spotify account linking.
//!
//! # Endpoints
//!
//! * `GET /connect` - Redirect the user to the Spotify consent page
//! * `GET /callback` - Complete the authorization-code exchange
//! * `GET /currently-playing` - Proxy the user's currently-playing track

use actix_web::{
    HttpRequest, HttpResponse, Result, Scope,
    cookie::{Cookie, SameSite},
    dev::{ServiceFactory, ServiceRequest},
    error::{ErrorBadRequest, ErrorInternalServerError},
    route,
    web::{self, Json},
};
use loveping_auth::{STATE_COOKIE, UserIdentity};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    SpotifyConfig, authorize_url, currently_playing, db, exchange_code,
    models::ApiCurrentlyPlaying, refresh_access_token,
};

/// Binds the Spotify endpoints to an Actix-web scope.
#[must_use]
pub fn bind_services<
    T: ServiceFactory<ServiceRequest, Config = (), Error = actix_web::Error, InitError = ()>,
>(
    scope: Scope<T>,
) -> Scope<T> {
    scope
        .service(connect_endpoint)
        .service(callback_endpoint)
        .service(currently_playing_endpoint)
}

fn secure_cookies() -> bool {
    std::env::var("COOKIE_SECURE").map_or(true, |x| {
        matches!(x.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}

fn configured() -> Result<SpotifyConfig> {
    SpotifyConfig::from_env().map_err(|e| {
        log::error!("Spotify is not configured: {e:?}");
        ErrorInternalServerError("spotify_not_configured")
    })
}

/// Endpoint to start the authorization-code flow.
///
/// Sets the `state` value in a cookie and redirects to the Spotify
/// consent page.
///
/// # Errors
///
/// * If Spotify is not configured
#[route("/connect", method = "GET")]
pub async fn connect_endpoint(user: UserIdentity) -> Result<HttpResponse> {
    let config = configured()?;

    let state = Uuid::new_v4().to_string();
    let url = authorize_url(&config, &state);

    let cookie = Cookie::build(STATE_COOKIE, state)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure_cookies())
        .finish();

    log::debug!("Redirecting user {} to Spotify consent", user.user_id);

    Ok(HttpResponse::Found()
        .insert_header(("location", url))
        .cookie(cookie)
        .finish())
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Endpoint completing the authorization-code exchange.
///
/// Verifies the `state` round-trip, exchanges the code and persists the
/// returned refresh token on the user's row.
///
/// # Errors
///
/// * If the user denied authorization
/// * If the code is missing or the state does not match
/// * If the code exchange fails or returns no refresh token
#[route("/callback", method = "GET")]
pub async fn callback_endpoint(
    req: HttpRequest,
    query: web::Query<CallbackQuery>,
    user: UserIdentity,
) -> Result<HttpResponse> {
    if let Some(error) = &query.error {
        log::warn!("Spotify authorization denied for user {}: {error}", user.user_id);
        return Err(ErrorBadRequest("authorization_denied"));
    }

    let Some(code) = &query.code else {
        return Err(ErrorBadRequest("missing_code"));
    };

    if let Some(expected) = req.cookie(STATE_COOKIE)
        && let Some(state) = &query.state
        && expected.value() != state
    {
        return Err(ErrorBadRequest("bad_state"));
    }

    let config = configured()?;

    let tokens = exchange_code(&config, code).await.map_err(|e| {
        log::error!("Spotify code exchange failed: {e:?}");
        ErrorBadRequest("spotify_token_error")
    })?;

    let Some(refresh_token) = tokens.refresh_token else {
        return Err(ErrorBadRequest("no_refresh_token_returned"));
    };

    db::save_refresh_token(user.user_id, &refresh_token).map_err(|e| {
        log::error!("Failed to save refresh token: {e:?}");
        ErrorInternalServerError("Failed to save refresh token")
    })?;

    log::info!("Linked Spotify account for user {}", user.user_id);

    let mut removal = Cookie::new(STATE_COOKIE, "");
    removal.make_removal();

    Ok(HttpResponse::Ok()
        .cookie(removal)
        .json(serde_json::json!({"linked": true})))
}

/// Endpoint proxying the user's currently-playing track.
///
/// # Errors
///
/// * 400 if the user has not linked a Spotify account
/// * If the token refresh or the player API call fails
#[route("/currently-playing", method = "GET")]
pub async fn currently_playing_endpoint(
    user: UserIdentity,
) -> Result<Json<ApiCurrentlyPlaying>> {
    let refresh_token = db::get_refresh_token(user.user_id)
        .map_err(|e| {
            log::error!("Failed to look up refresh token: {e:?}");
            ErrorInternalServerError("Failed to look up refresh token")
        })?
        .ok_or_else(|| ErrorBadRequest("spotify_not_linked"))?;

    let config = configured()?;

    let tokens = refresh_access_token(&config, &refresh_token)
        .await
        .map_err(|e| {
            log::error!("Spotify token refresh failed: {e:?}");
            ErrorBadRequest("spotify_refresh_error")
        })?;

    let playing = currently_playing(&tokens.access_token).await.map_err(|e| {
        log::error!("Spotify currently-playing request failed: {e:?}");
        ErrorBadRequest("spotify_api_error")
    })?;

    Ok(Json(playing.into()))
}
