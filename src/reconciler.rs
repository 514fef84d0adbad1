//! The per-channel state-reconciliation loop.
//!
//! For each tracked channel the reconciler decides, from the persisted record
//! plus fresh (or cached) upstream data, whether a live announcement must be
//! created, left alone, or edited into a post-stream summary. The invariants it
//! maintains:
//!
//! - at most one open announcement per live session, where a session is
//!   identified by exact string equality on its `started_at`;
//! - re-running with unchanged upstream state changes nothing;
//! - cached user/channel metadata expires after 60 minutes, and a failed
//!   refetch keeps the stale blob rather than dropping it.
//!
//! Every upstream failure is absorbed here: a failed lookup is "no data this
//! cycle" and the next scheduled cycle is the sole recovery mechanism.

use crate::discord::Notifier;
use crate::record::{CachedChannel, CachedUser, ChannelRecord, VodSummary};
use crate::twitch::types::LiveSession;
use crate::twitch::{AuthRejected, LiveStreamApi};
use jiff::Timestamp;

/// Drives the state machine for one channel record at a time.
pub struct Reconciler<'a, A, N> {
    api: &'a A,
    notifier: &'a N,
}

impl<'a, A: LiveStreamApi, N: Notifier> Reconciler<'a, A, N> {
    pub fn new(api: &'a A, notifier: &'a N) -> Self {
        Self { api, notifier }
    }

    /// One full pass over one record: metadata refresh, live check, state
    /// transition. Mutates the record in place; the caller persists it
    /// afterwards regardless of what happened.
    pub async fn reconcile(&self, record: &mut ChannelRecord, now: Timestamp) {
        tracing::debug!(channel = %record.channel_name, "processing channel");
        self.refresh_user_cache(record, now).await;
        self.refresh_channel_cache(record, now).await;
        self.check_live(record).await;
        tracing::debug!(channel = %record.channel_name, "done processing channel");
    }

    async fn refresh_user_cache(&self, record: &mut ChannelRecord, now: Timestamp) {
        if !record.needs_user_refresh(now) {
            tracing::trace!(channel = %record.channel_name, "using cached user info");
            return;
        }
        match self.api.user_by_login(&record.channel_name).await {
            Ok(Some(user)) => {
                tracing::debug!(
                    channel = %record.channel_name,
                    user_id = %user.id,
                    "refreshed user info"
                );
                record.cached_user = Some(CachedUser {
                    user,
                    fetched_at: now,
                });
            }
            Ok(None) => {
                // Stale-but-present beats absent.
                tracing::debug!(
                    channel = %record.channel_name,
                    "no matching user upstream, keeping prior cache"
                );
            }
            Err(e) => {
                tracing::warn!(
                    channel = %record.channel_name,
                    error = %e,
                    "user lookup failed, keeping prior cache"
                );
            }
        }
    }

    async fn refresh_channel_cache(&self, record: &mut ChannelRecord, now: Timestamp) {
        if !record.needs_channel_refresh(now) {
            tracing::trace!(channel = %record.channel_name, "using cached channel info");
            return;
        }
        match self.api.channel_by_query(&record.channel_name).await {
            Ok(Some(channel)) => {
                tracing::debug!(channel = %record.channel_name, "refreshed channel info");
                record.cached_channel = Some(CachedChannel {
                    channel,
                    fetched_at: now,
                });
            }
            Ok(None) => {
                tracing::debug!(
                    channel = %record.channel_name,
                    "no matching channel upstream, keeping prior cache"
                );
            }
            Err(e) => {
                tracing::warn!(
                    channel = %record.channel_name,
                    error = %e,
                    "channel lookup failed, keeping prior cache"
                );
            }
        }
    }

    /// Queries live status and applies the state transition.
    ///
    /// Without a cached user there is no upstream user id, so the live check is
    /// skipped entirely until a later cycle manages to fetch the user.
    async fn check_live(&self, record: &mut ChannelRecord) {
        let Some(user_id) = record.cached_user.as_ref().map(|c| c.user.id.clone()) else {
            tracing::debug!(
                channel = %record.channel_name,
                "no cached user info, cannot check live status"
            );
            return;
        };

        let session = match self.api.live_stream(&user_id).await {
            Ok(session) => session,
            Err(e) if e.downcast_ref::<AuthRejected>().is_some() => {
                // The token expired between the guard's check and this lookup;
                // the guard mints a fresh one at the next cycle boundary.
                tracing::warn!(
                    channel = %record.channel_name,
                    "app access token rejected mid-cycle, treating as not live"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    channel = %record.channel_name,
                    error = %e,
                    "live stream lookup failed, treating as not live this cycle"
                );
                None
            }
        };

        match session {
            Some(session) => self.handle_live(record, &user_id, &session).await,
            None => self.handle_offline(record).await,
        }
    }

    async fn handle_live(&self, record: &mut ChannelRecord, user_id: &str, session: &LiveSession) {
        let game = if session.game_id.is_empty() {
            None
        } else {
            match self.api.game(&session.game_id).await {
                Ok(game) => game,
                Err(e) => {
                    tracing::warn!(
                        channel = %record.channel_name,
                        error = %e,
                        "game lookup failed, announcing without category"
                    );
                    None
                }
            }
        };

        let already_announced =
            record.last_notified_session_start.as_deref() == Some(session.started_at.as_str());

        if !already_announced {
            // A new session, including the case where the previous session's
            // announcement was never closed out: the old message id is simply
            // overwritten.
            tracing::info!(
                channel = %record.channel_name,
                started_at = %session.started_at,
                "live session not yet announced, posting to Discord"
            );
            match self
                .notifier
                .post_live_notification(record, session, game.as_ref())
                .await
            {
                Ok(message_id) => {
                    record.last_notification_message_id = Some(message_id);
                    record.last_vod_summary = self.lookup_vod(record, user_id, &session.title).await;
                }
                Err(e) => {
                    // The session still counts as announced below, so delivery is
                    // attempted at most once per session. A message id left over
                    // from an earlier session no longer belongs to the session
                    // being announced, so it is dropped rather than edited later.
                    record.last_notification_message_id = None;
                    tracing::error!(
                        channel = %record.channel_name,
                        error = %e,
                        "posting live announcement failed"
                    );
                }
            }
            record.last_notified_session_start = Some(session.started_at.clone());
        } else {
            let vod_current = record
                .last_vod_summary
                .as_ref()
                .is_some_and(|vod| vod.title == session.title);
            if vod_current {
                tracing::trace!(
                    channel = %record.channel_name,
                    "announcement and VOD already up to date"
                );
            } else if let Some(vod) = self.lookup_vod(record, user_id, &session.title).await {
                record.last_vod_summary = Some(vod);
            }
        }
    }

    async fn handle_offline(&self, record: &mut ChannelRecord) {
        if record.last_notification_message_id.is_none() {
            tracing::trace!(
                channel = %record.channel_name,
                "not live and no open announcement"
            );
            return;
        }

        tracing::info!(
            channel = %record.channel_name,
            "stream ended, editing announcement to offline"
        );
        if let Err(e) = self.notifier.edit_to_offline(record).await {
            tracing::error!(
                channel = %record.channel_name,
                error = %e,
                "editing announcement to offline failed"
            );
        }

        record.last_notification_message_id = None;
        record.last_notified_session_start = None;
        record.last_vod_summary = None;
    }

    /// Fetches the most recent archived broadcast and matches it to the live
    /// session by exact title equality. Any miss or failure is a quiet [`None`].
    async fn lookup_vod(
        &self,
        record: &ChannelRecord,
        user_id: &str,
        live_title: &str,
    ) -> Option<VodSummary> {
        match self.api.archived_video(user_id).await {
            Ok(Some(video)) if video.title == live_title => {
                tracing::debug!(channel = %record.channel_name, vod = %video.id, "matched VOD");
                Some(VodSummary {
                    title: video.title,
                    url: video.url,
                })
            }
            Ok(Some(video)) => {
                tracing::debug!(
                    channel = %record.channel_name,
                    vod = %video.id,
                    "latest archived broadcast does not match the live title"
                );
                None
            }
            Ok(None) => {
                tracing::debug!(channel = %record.channel_name, "no archived broadcast yet");
                None
            }
            Err(e) => {
                tracing::warn!(
                    channel = %record.channel_name,
                    error = %e,
                    "archived broadcast lookup failed"
                );
                None
            }
        }
    }
}
