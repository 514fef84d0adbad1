//! Twitch Helix API response types.
//!
//! Only the fields this service actually reads are modelled; Helix returns many
//! more. Every list endpoint wraps its results in the same `{ "data": [...] }`
//! envelope, and "no match" is an empty array rather than an error.

use serde::{Deserialize, Serialize};

/// The `{ "data": [...] }` envelope shared by all Helix list responses.
///
/// See: <https://dev.twitch.tv/docs/api/reference/>
#[derive(Debug, Serialize, Deserialize)]
pub struct HelixResponse<T> {
    pub data: Vec<T>,
}

impl<T> HelixResponse<T> {
    /// First item of the response, consuming the envelope.
    ///
    /// Every lookup this service performs is a "first result wins" query.
    pub fn into_first(self) -> Option<T> {
        self.data.into_iter().next()
    }
}

/// A Twitch user, from `GET /helix/users`.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#get-users>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// The ID Twitch uses to uniquely identify the user; required for the
    /// streams and videos lookups.
    pub id: String,
    /// The user's login name (lowercase handle).
    pub login: String,
    /// The user's display name.
    pub display_name: String,
    /// The user's channel description ("bio"). May be empty.
    #[serde(default)]
    pub description: String,
    /// URL of the user's profile image.
    pub profile_image_url: String,
    /// URL of the image shown on the channel page while offline. Empty when the
    /// user never configured one.
    #[serde(default)]
    pub offline_image_url: String,
}

/// A channel search result, from `GET /helix/search/channels`.
///
/// Fetched and cached alongside the user blob; the search is by free-text query
/// and the first result wins.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#search-channels>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// The ID of the channel (same namespace as user IDs).
    pub id: String,
    pub broadcaster_login: String,
    pub display_name: String,
    /// Name of the category the broadcaster last streamed in. May be empty.
    #[serde(default)]
    pub game_name: String,
    /// The channel's current (or last) stream title.
    #[serde(default)]
    pub title: String,
    pub is_live: bool,
}

/// A live stream, from `GET /helix/streams`.
///
/// One continuous broadcast; its identity is the `started_at` string. Never
/// cached, fetched fresh every cycle.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#get-streams>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSession {
    pub id: String,
    pub user_id: String,
    /// ID of the category being streamed; empty when the broadcaster picked none.
    #[serde(default)]
    pub game_id: String,
    pub title: String,
    /// Stream start time as reported by Twitch (RFC 3339). Kept verbatim: session
    /// identity is exact string equality on this value.
    pub started_at: String,
    /// Preview image URL containing literal `{width}` and `{height}` placeholders.
    pub thumbnail_url: String,
}

/// A game/category, from `GET /helix/games`.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#get-games>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
}

/// An archived broadcast ("VOD"), from `GET /helix/videos?type=archive`.
///
/// See: <https://dev.twitch.tv/docs/api/reference/#get-videos>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub url: String,
}
