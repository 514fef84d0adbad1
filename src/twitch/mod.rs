//! Twitch Helix API client library.
//!
//! Two concerns live here:
//!
//! - [`client::TwitchClient`] - the stateless request/response wrapper around the
//!   five Helix lookups this service needs (user, channel search, live stream,
//!   game, archived video). Each lookup yields at most one record; "no match"
//!   is a quiet [`None`].
//! - [`auth::TokenGuard`] - validates the app access token before a cycle and
//!   mints a fresh one via the client-credentials grant when Twitch rejects it.
//!
//! The lookups are expressed through the [`LiveStreamApi`] trait so the
//! reconciler can be driven by an in-memory fake in tests.

pub mod auth;
pub mod client;
pub mod types;

use std::future::Future;
use types::{ChannelInfo, Game, LiveSession, User, Video};

pub use auth::{TokenGate, TokenGuard};
pub use client::{AuthRejected, SharedToken, TwitchClient};

/// The upstream lookups the reconciler depends on.
///
/// One call = one optional record; transport failures surface as errors for the
/// caller to absorb. Implemented by [`TwitchClient`] for production and by fakes
/// in the reconciler's tests.
pub trait LiveStreamApi {
    /// Looks up a user by their login name.
    fn user_by_login(&self, login: &str)
    -> impl Future<Output = eyre::Result<Option<User>>> + Send;

    /// Searches channels by free-text query; first result wins.
    fn channel_by_query(
        &self,
        query: &str,
    ) -> impl Future<Output = eyre::Result<Option<ChannelInfo>>> + Send;

    /// Fetches the user's currently-live stream, if any.
    fn live_stream(
        &self,
        user_id: &str,
    ) -> impl Future<Output = eyre::Result<Option<LiveSession>>> + Send;

    /// Resolves a category/game id to its metadata.
    fn game(&self, game_id: &str) -> impl Future<Output = eyre::Result<Option<Game>>> + Send;

    /// Fetches the user's most recent archived broadcast.
    fn archived_video(
        &self,
        user_id: &str,
    ) -> impl Future<Output = eyre::Result<Option<Video>>> + Send;
}
