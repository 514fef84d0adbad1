//! Per-streamer channel records and the metadata caching policy.
//!
//! A [`ChannelRecord`] is one document in the channel store: the operator-supplied
//! configuration (Twitch login, Discord channel, announce text) plus the state the
//! reconciler carries between cycles (cached Twitch metadata, the open notification,
//! and the matched VOD). Records are seeded out-of-band; this crate only mutates the
//! state fields and writes the whole document back.

use crate::twitch::types::{ChannelInfo, User};
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Deserializer, Serialize};

/// How long cached user/channel metadata stays fresh before a refetch.
pub const CACHE_TTL: SignedDuration = SignedDuration::from_mins(60);

/// Returns true when a blob fetched at `fetched_at` is still fresh at `now`.
///
/// The boundary is inclusive on the stale side: a blob exactly [`CACHE_TTL`] old
/// must be refetched.
pub fn cache_is_fresh(fetched_at: Timestamp, now: Timestamp) -> bool {
    now.duration_since(fetched_at) < CACHE_TTL
}

/// A Twitch user blob together with the time it was fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedUser {
    #[serde(flatten)]
    pub user: User,
    pub fetched_at: Timestamp,
}

/// A Twitch channel-search blob together with the time it was fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedChannel {
    #[serde(flatten)]
    pub channel: ChannelInfo,
    pub fetched_at: Timestamp,
}

/// The archived broadcast matched (by exact title) to the announced session.
///
/// Used both to decide whether the post-stream lookup already happened and to
/// render the VOD link when the announcement is edited to offline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VodSummary {
    pub title: String,
    pub url: String,
}

/// One tracked streamer: configuration plus reconciler state, stored as a single
/// document keyed by `_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// Document revision, round-tripped untouched so the store's optimistic
    /// concurrency keeps working.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Twitch login used for all upstream lookups. Immutable.
    pub channel_name: String,
    /// Discord channel that receives the announcement.
    pub notification_channel_id: String,
    /// Operator-supplied announce text; a fixed default is used when absent.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub custom_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_user: Option<CachedUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_channel: Option<CachedChannel>,
    /// `started_at` of the live session last announced. Session identity is
    /// plain string equality on this value.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub last_notified_session_start: Option<String>,
    /// Discord message id of the open announcement, cleared by the offline edit.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub last_notification_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_vod_summary: Option<VodSummary>,
}

impl ChannelRecord {
    /// Whether the cached user blob must be refetched this cycle.
    pub fn needs_user_refresh(&self, now: Timestamp) -> bool {
        !self
            .cached_user
            .as_ref()
            .is_some_and(|c| cache_is_fresh(c.fetched_at, now))
    }

    /// Whether the cached channel blob must be refetched this cycle.
    pub fn needs_channel_refresh(&self, now: Timestamp) -> bool {
        !self
            .cached_channel
            .as_ref()
            .is_some_and(|c| cache_is_fresh(c.fetched_at, now))
    }
}

/// Documents seeded by earlier tooling store "none" as `""`; treat both the
/// empty string and an absent field as [`None`].
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn cache_fresh_below_ttl() {
        let now = ts("2024-01-01T12:00:00Z");
        assert!(cache_is_fresh(now - SignedDuration::from_mins(59), now));
    }

    #[test]
    fn cache_stale_at_exactly_ttl() {
        let now = ts("2024-01-01T12:00:00Z");
        assert!(!cache_is_fresh(now - SignedDuration::from_mins(60), now));
    }

    #[test]
    fn cache_stale_beyond_ttl() {
        let now = ts("2024-01-01T12:00:00Z");
        assert!(!cache_is_fresh(now - SignedDuration::from_mins(61), now));
    }

    #[test]
    fn absent_blobs_need_refresh() {
        let record: ChannelRecord = serde_json::from_value(serde_json::json!({
            "_id": "doc1",
            "channel_name": "somestreamer",
            "notification_channel_id": "123",
        }))
        .unwrap();

        let now = ts("2024-01-01T12:00:00Z");
        assert!(record.needs_user_refresh(now));
        assert!(record.needs_channel_refresh(now));
    }

    #[test]
    fn fresh_blob_suppresses_refresh() {
        let now = ts("2024-01-01T12:00:00Z");
        let record: ChannelRecord = serde_json::from_value(serde_json::json!({
            "_id": "doc1",
            "channel_name": "somestreamer",
            "notification_channel_id": "123",
            "cached_user": {
                "id": "42",
                "login": "somestreamer",
                "display_name": "SomeStreamer",
                "profile_image_url": "https://example.com/avatar.png",
                "fetched_at": "2024-01-01T11:30:00Z",
            },
        }))
        .unwrap();

        assert!(!record.needs_user_refresh(now));
        // A fresh user blob says nothing about the channel blob.
        assert!(record.needs_channel_refresh(now));
    }

    #[test]
    fn legacy_empty_strings_deserialize_as_none() {
        let record: ChannelRecord = serde_json::from_value(serde_json::json!({
            "_id": "doc1",
            "_rev": "3-abc",
            "channel_name": "somestreamer",
            "notification_channel_id": "123",
            "custom_message": "",
            "last_notified_session_start": "",
            "last_notification_message_id": "",
        }))
        .unwrap();

        assert_eq!(record.rev.as_deref(), Some("3-abc"));
        assert_eq!(record.custom_message, None);
        assert_eq!(record.last_notified_session_start, None);
        assert_eq!(record.last_notification_message_id, None);
    }

    #[test]
    fn document_round_trip_preserves_revision_and_state() {
        let record = ChannelRecord {
            id: "doc1".into(),
            rev: Some("7-def".into()),
            channel_name: "somestreamer".into(),
            notification_channel_id: "123".into(),
            custom_message: Some("go watch!".into()),
            cached_user: None,
            cached_channel: None,
            last_notified_session_start: Some("2024-01-01T00:00:00Z".into()),
            last_notification_message_id: Some("msg-1".into()),
            last_vod_summary: Some(VodSummary {
                title: "Stream title".into(),
                url: "https://twitch.tv/videos/1".into(),
            }),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["_rev"], "7-def");
        let back: ChannelRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.rev.as_deref(), Some("7-def"));
        assert_eq!(
            back.last_notified_session_start.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(back.last_vod_summary, record.last_vod_summary);
    }
}
