//! Spotify account linking.
//!
//! Implements the OAuth 2.0 authorization-code flow against the Spotify
//! accounts service and a thin proxy for the currently-playing endpoint.
//! Refresh tokens are persisted per user; access tokens are refetched on
//! demand and never stored.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

#[cfg(feature = "api")]
pub mod api;

pub mod db;
pub mod models;

use std::sync::LazyLock;

use thiserror::Error;
use url::form_urlencoded;

use crate::models::{SpotifyCurrentlyPlaying, SpotifyTokenResponse};

/// Scopes requested during the authorization-code flow.
pub const SPOTIFY_SCOPES: &str = "user-read-currently-playing user-read-playback-state";

static SPOTIFY_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
static SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com/v1";

static CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

#[derive(Debug, Error)]
pub enum Error {
    #[error("Spotify is not configured")]
    NotConfigured,
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("Request failed (error {0}): {1}")]
    HttpRequestFailed(u16, String),
}

trait ToUrl {
    fn to_url(&self) -> String;
}

enum SpotifyApiEndpoint {
    Authorize,
    Token,
    CurrentlyPlaying,
}

impl ToUrl for SpotifyApiEndpoint {
    fn to_url(&self) -> String {
        match self {
            Self::Authorize => format!("{SPOTIFY_ACCOUNTS_BASE_URL}/authorize"),
            Self::Token => format!("{SPOTIFY_ACCOUNTS_BASE_URL}/api/token"),
            Self::CurrentlyPlaying => {
                format!("{SPOTIFY_API_BASE_URL}/me/player/currently-playing")
            }
        }
    }
}

/// Client credentials and redirect target for the authorization-code flow.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl SpotifyConfig {
    /// Reads `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET` and
    /// `SPOTIFY_REDIRECT_URI` from the environment.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConfigured`] if any of the three is missing
    pub fn from_env() -> Result<Self, Error> {
        let client_id = std::env::var("SPOTIFY_CLIENT_ID").unwrap_or_default();
        let client_secret = std::env::var("SPOTIFY_CLIENT_SECRET").unwrap_or_default();
        let redirect_uri = std::env::var("SPOTIFY_REDIRECT_URI").unwrap_or_default();

        if client_id.is_empty() || client_secret.is_empty() || redirect_uri.is_empty() {
            return Err(Error::NotConfigured);
        }

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
        })
    }
}

/// Builds the Spotify consent-page URL for the authorization-code flow.
#[must_use]
pub fn authorize_url(config: &SpotifyConfig, state: &str) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());

    query.append_pair("client_id", &config.client_id);
    query.append_pair("response_type", "code");
    query.append_pair("redirect_uri", &config.redirect_uri);
    query.append_pair("scope", SPOTIFY_SCOPES);
    query.append_pair("state", state);
    query.append_pair("show_dialog", "false");

    format!(
        "{}?{}",
        SpotifyApiEndpoint::Authorize.to_url(),
        query.finish()
    )
}

/// Exchanges an authorization code for tokens.
///
/// # Errors
///
/// * If the HTTP request fails
/// * If the token endpoint rejects the code
pub async fn exchange_code(
    config: &SpotifyConfig,
    code: &str,
) -> Result<SpotifyTokenResponse, Error> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];

    token_request(config, &params).await
}

/// Fetches a fresh access token from a stored refresh token.
///
/// # Errors
///
/// * If the HTTP request fails
/// * If the token endpoint rejects the refresh token
pub async fn refresh_access_token(
    config: &SpotifyConfig,
    refresh_token: &str,
) -> Result<SpotifyTokenResponse, Error> {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];

    token_request(config, &params).await
}

async fn token_request(
    config: &SpotifyConfig,
    params: &[(&str, &str)],
) -> Result<SpotifyTokenResponse, Error> {
    let response = CLIENT
        .post(SpotifyApiEndpoint::Token.to_url())
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .form(params)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        return Err(Error::HttpRequestFailed(
            status,
            response.text().await.unwrap_or_default(),
        ));
    }

    Ok(response.json().await?)
}

/// Fetches the track the user is currently playing, if any.
///
/// A 204 from Spotify means nothing is playing and maps to the default
/// (not playing, no item) response.
///
/// # Errors
///
/// * If the HTTP request fails
/// * If the API rejects the access token
pub async fn currently_playing(access_token: &str) -> Result<SpotifyCurrentlyPlaying, Error> {
    let response = CLIENT
        .get(SpotifyApiEndpoint::CurrentlyPlaying.to_url())
        .bearer_auth(access_token)
        .send()
        .await?;

    if response.status() == reqwest::StatusCode::NO_CONTENT {
        return Ok(SpotifyCurrentlyPlaying::default());
    }

    if !response.status().is_success() {
        let status = response.status().as_u16();
        return Err(Error::HttpRequestFailed(
            status,
            response.text().await.unwrap_or_default(),
        ));
    }

    Ok(response.json().await?)
}
