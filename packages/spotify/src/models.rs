//! Spotify API data models and their API projections.

use serde::{Deserialize, Serialize};

/// Token endpoint response for both the code-exchange and refresh grants.
///
/// `refresh_token` is absent on refresh responses.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u32>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Currently-playing state as returned by the Spotify player API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyCurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub item: Option<SpotifyTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// API projection of the currently-playing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCurrentlyPlaying {
    pub is_playing: bool,
    pub track_id: Option<String>,
    pub name: Option<String>,
}

impl From<SpotifyCurrentlyPlaying> for ApiCurrentlyPlaying {
    fn from(value: SpotifyCurrentlyPlaying) -> Self {
        let (track_id, name) = value
            .item
            .map_or((None, None), |item| (item.id, item.name));

        Self {
            is_playing: value.is_playing,
            track_id,
            name,
        }
    }
}
