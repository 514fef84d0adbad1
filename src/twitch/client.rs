//! Twitch Helix client and the process-wide bearer credential it reads.

use crate::twitch::LiveStreamApi;
use crate::twitch::types::{ChannelInfo, Game, HelixResponse, LiveSession, User, Video};
use eyre::Context;
use http::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

const HELIX_BASE: &str = "https://api.twitch.tv/helix";

/// The single mutable app access token shared by every outgoing Helix call.
///
/// The token guard swaps in a fresh token once per cycle before any lookups run;
/// all clients holding a clone of this handle observe the replacement. Passed
/// explicitly rather than living in a global.
#[derive(Debug, Clone)]
pub struct SharedToken(Arc<Mutex<String>>);

impl SharedToken {
    pub fn new(initial: String) -> Self {
        Self(Arc::new(Mutex::new(initial)))
    }

    /// The current bearer secret.
    pub async fn bearer(&self) -> String {
        self.0.lock().await.clone()
    }

    /// Replaces the credential for all holders of this handle.
    pub async fn replace(&self, new: String) {
        *self.0.lock().await = new;
    }
}

/// Marker error for a 401-class upstream rejection.
///
/// This is the only lookup failure the reconciler distinguishes: a token
/// rejected mid-cycle is logged as such rather than as a generic transport
/// failure, and the guard mints a fresh token at the next cycle boundary.
/// Downcast it from the `eyre` chain.
#[derive(Debug)]
pub struct AuthRejected(pub StatusCode);

impl fmt::Display for AuthRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Twitch rejected the app access token ({})", self.0)
    }
}

impl std::error::Error for AuthRejected {}

/// Client for the Twitch Helix API.
///
/// Stateless request/response wrapper: every lookup attaches the `Client-Id`
/// header and the current bearer from the [`SharedToken`], and yields at most
/// one record. An empty Helix `data` array is a quiet absence, not an error.
#[derive(Debug, Clone)]
pub struct TwitchClient {
    http: reqwest::Client,
    client_id: String,
    token: SharedToken,
}

impl TwitchClient {
    pub fn new(http: reqwest::Client, client_id: String, token: SharedToken) -> Self {
        Self {
            http,
            client_id,
            token,
        }
    }

    /// Makes an authenticated GET against a Helix endpoint.
    ///
    /// Consolidates the shared per-request logic: bearer + `Client-Id` headers,
    /// query parameters, and status handling. A 401 becomes the typed
    /// [`AuthRejected`] error; any other non-success status is a plain error
    /// with the response body attached.
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> eyre::Result<reqwest::Response> {
        let bearer = self.token.bearer().await;
        let response = self
            .http
            .get(url)
            .header("Client-Id", &self.client_id)
            .bearer_auth(bearer)
            .query(query)
            .send()
            .await
            .with_context(|| format!("send request to Twitch API: {url}"))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(eyre::Report::new(AuthRejected(status)));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "Twitch API request to {url} failed with status {status}: {body}"
            ));
        }

        Ok(response)
    }

    /// Runs a first-result-wins Helix lookup.
    async fn first<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> eyre::Result<Option<T>> {
        let response: HelixResponse<T> = self
            .get(url, query)
            .await?
            .json()
            .await
            .context("parse Twitch API response as JSON")?;
        Ok(response.into_first())
    }
}

impl LiveStreamApi for TwitchClient {
    /// Looks up a user by login via `GET /helix/users`.
    #[instrument(skip(self))]
    async fn user_by_login(&self, login: &str) -> eyre::Result<Option<User>> {
        self.first(&format!("{HELIX_BASE}/users"), &[("login", login)])
            .await
    }

    /// Searches channels by free-text query via `GET /helix/search/channels`;
    /// first result wins.
    #[instrument(skip(self))]
    async fn channel_by_query(&self, query: &str) -> eyre::Result<Option<ChannelInfo>> {
        self.first(
            &format!("{HELIX_BASE}/search/channels"),
            &[("query", query)],
        )
        .await
    }

    /// Fetches the user's current live stream via `GET /helix/streams`, if any.
    #[instrument(skip(self))]
    async fn live_stream(&self, user_id: &str) -> eyre::Result<Option<LiveSession>> {
        self.first(&format!("{HELIX_BASE}/streams"), &[("user_id", user_id)])
            .await
    }

    /// Resolves a category id via `GET /helix/games`.
    #[instrument(skip(self))]
    async fn game(&self, game_id: &str) -> eyre::Result<Option<Game>> {
        self.first(&format!("{HELIX_BASE}/games"), &[("id", game_id)])
            .await
    }

    /// Fetches the user's most recent archived broadcast via
    /// `GET /helix/videos?type=archive`. Title matching against the live session
    /// is the caller's concern.
    #[instrument(skip(self))]
    async fn archived_video(&self, user_id: &str) -> eyre::Result<Option<Video>> {
        self.first(
            &format!("{HELIX_BASE}/videos"),
            &[("user_id", user_id), ("type", "archive")],
        )
        .await
    }
}
