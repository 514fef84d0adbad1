//! Discord notification delivery: rich announce embeds and the in-place edit to
//! the post-stream summary.

use crate::record::ChannelRecord;
use crate::twitch::types::{Game, LiveSession};
use eyre::Context;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::instrument;

const DISCORD_API: &str = "https://discord.com/api/v10";

/// Announce text used when the record carries no custom message.
const DEFAULT_ANNOUNCE: &str = "Hey everyone! Come watch this awesome streamer!";

/// Resolution substituted into the stream preview's `{width}`/`{height}` template.
const THUMBNAIL_RESOLUTION: (&str, &str) = ("1920", "1080");

/// The chat-side collaborator the reconciler talks to.
///
/// Implemented by [`DiscordNotifier`] for production and by fakes in the
/// reconciler's tests.
pub trait Notifier {
    /// Creates the live announcement and returns the platform-assigned message id.
    fn post_live_notification(
        &self,
        record: &ChannelRecord,
        session: &LiveSession,
        game: Option<&Game>,
    ) -> impl Future<Output = eyre::Result<String>> + Send;

    /// Edits the open announcement (identified by the record's stored message id)
    /// in place to its "no longer live" form.
    fn edit_to_offline(&self, record: &ChannelRecord) -> impl Future<Output = eyre::Result<()>> + Send;
}

/// A Discord rich embed, shaped for the REST message endpoints.
///
/// See: <https://discord.com/developers/docs/resources/message#embed-object>
#[derive(Debug, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO 8601 timestamp rendered by Discord in the viewer's locale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Builds the live announcement: message content plus embed.
///
/// `now` feeds the cache-busting `?ts=` query parameter on image URLs, so that
/// Discord's media proxy does not serve a stale avatar or preview frame.
fn live_message(
    record: &ChannelRecord,
    session: &LiveSession,
    game: Option<&Game>,
    now: Timestamp,
) -> (String, Embed) {
    let ts = now.as_millisecond();
    let mut embed = Embed {
        title: Some(session.title.clone()),
        footer: Some(EmbedFooter {
            text: "Started streaming".into(),
        }),
        timestamp: Some(session.started_at.clone()),
        ..Embed::default()
    };

    if let Some(cached) = &record.cached_user {
        let user = &cached.user;
        let channel_url = format!("https://twitch.tv/{}", user.login);
        embed.author = Some(EmbedAuthor {
            name: user.display_name.clone(),
            url: Some(channel_url.clone()),
            icon_url: Some(format!("{}?ts={ts}", user.profile_image_url)),
        });
        embed.url = Some(channel_url);
        embed.thumbnail = Some(EmbedImage {
            url: format!("{}?ts={ts}", user.profile_image_url),
        });
        if !user.description.is_empty() {
            embed.description = Some(user.description.clone());
        }
    }

    let preview = session
        .thumbnail_url
        .replace("{width}", THUMBNAIL_RESOLUTION.0)
        .replace("{height}", THUMBNAIL_RESOLUTION.1);
    embed.image = Some(EmbedImage {
        url: format!("{preview}?ts={ts}"),
    });

    if let Some(game) = game {
        embed.fields.push(EmbedField {
            name: "Game".into(),
            value: game.name.clone(),
            inline: true,
        });
    }

    let content = record
        .custom_message
        .clone()
        .unwrap_or_else(|| DEFAULT_ANNOUNCE.to_string());

    (content, embed)
}

/// Builds the "no longer live" form of the announcement, linking the matched
/// VOD when one was found during the session.
fn offline_message(record: &ChannelRecord, now: Timestamp) -> (String, Embed) {
    let ts = now.as_millisecond();
    let mut embed = Embed {
        footer: Some(EmbedFooter {
            text: "Last online".into(),
        }),
        timestamp: Some(now.to_string()),
        ..Embed::default()
    };

    let display_name = match &record.cached_user {
        Some(cached) => {
            let user = &cached.user;
            let channel_url = format!("https://twitch.tv/{}", user.login);
            embed.author = Some(EmbedAuthor {
                name: user.display_name.clone(),
                url: Some(channel_url.clone()),
                icon_url: Some(format!("{}?ts={ts}", user.profile_image_url)),
            });
            embed.url = Some(channel_url);
            embed.thumbnail = Some(EmbedImage {
                url: format!("{}?ts={ts}", user.profile_image_url),
            });
            if !user.description.is_empty() {
                embed.description = Some(user.description.clone());
            }
            if !user.offline_image_url.is_empty() {
                embed.image = Some(EmbedImage {
                    url: format!("{}?ts={ts}", user.offline_image_url),
                });
            }
            user.display_name.clone()
        }
        None => record.channel_name.clone(),
    };

    let mut content = format!("{display_name} is not online anymore.");
    if let Some(vod) = &record.last_vod_summary {
        embed.title = Some(vod.title.clone());
        embed.fields.push(EmbedField {
            name: "VOD".into(),
            value: format!("[Link]({})", vod.url),
            inline: false,
        });
        content.push_str(" Check out the VOD!");
    }

    (content, embed)
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    content: &'a str,
    embeds: [&'a Embed; 1],
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

/// Notifier backed by the Discord REST API, authenticated as a bot.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    http: reqwest::Client,
    bot_token: String,
}

impl DiscordNotifier {
    pub fn new(http: reqwest::Client, bot_token: String) -> Self {
        Self { http, bot_token }
    }

    async fn send(
        &self,
        method: http::Method,
        url: String,
        content: &str,
        embed: &Embed,
    ) -> eyre::Result<reqwest::Response> {
        let response = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&MessagePayload {
                content,
                embeds: [embed],
            })
            .send()
            .await
            .with_context(|| format!("send {method} request to Discord API: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "Discord API {method} request failed with status {status}: {body}"
            ));
        }

        Ok(response)
    }
}

impl Notifier for DiscordNotifier {
    #[instrument(skip(self, record, session, game), fields(channel = %record.channel_name))]
    async fn post_live_notification(
        &self,
        record: &ChannelRecord,
        session: &LiveSession,
        game: Option<&Game>,
    ) -> eyre::Result<String> {
        let (content, embed) = live_message(record, session, game, Timestamp::now());
        let url = format!(
            "{DISCORD_API}/channels/{}/messages",
            record.notification_channel_id
        );

        let created: CreatedMessage = self
            .send(http::Method::POST, url, &content, &embed)
            .await?
            .json()
            .await
            .context("parse Discord create-message response as JSON")?;

        tracing::info!(message_id = %created.id, "posted live announcement");
        Ok(created.id)
    }

    #[instrument(skip(self, record), fields(channel = %record.channel_name))]
    async fn edit_to_offline(&self, record: &ChannelRecord) -> eyre::Result<()> {
        let message_id = record
            .last_notification_message_id
            .as_deref()
            .ok_or_else(|| eyre::eyre!("record has no open announcement to edit"))?;

        let (content, embed) = offline_message(record, Timestamp::now());
        let url = format!(
            "{DISCORD_API}/channels/{}/messages/{message_id}",
            record.notification_channel_id
        );

        self.send(http::Method::PATCH, url, &content, &embed)
            .await?;

        tracing::info!(message_id = %message_id, "edited announcement to offline");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CachedUser, VodSummary};
    use crate::twitch::types::User;

    fn sample_user() -> User {
        serde_json::from_value(serde_json::json!({
            "id": "42",
            "login": "somestreamer",
            "display_name": "SomeStreamer",
            "description": "I play games",
            "profile_image_url": "https://example.com/avatar.png",
            "offline_image_url": "https://example.com/offline.png",
        }))
        .unwrap()
    }

    fn sample_record() -> ChannelRecord {
        ChannelRecord {
            id: "doc1".into(),
            rev: None,
            channel_name: "somestreamer".into(),
            notification_channel_id: "123".into(),
            custom_message: None,
            cached_user: Some(CachedUser {
                user: sample_user(),
                fetched_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            }),
            cached_channel: None,
            last_notified_session_start: None,
            last_notification_message_id: None,
            last_vod_summary: None,
        }
    }

    fn sample_session() -> LiveSession {
        serde_json::from_value(serde_json::json!({
            "id": "999",
            "user_id": "42",
            "game_id": "7",
            "title": "Speedrunning all day",
            "started_at": "2024-01-01T01:00:00Z",
            "thumbnail_url": "https://example.com/preview-{width}x{height}.jpg",
        }))
        .unwrap()
    }

    fn now() -> Timestamp {
        "2024-01-01T02:00:00Z".parse().unwrap()
    }

    #[test]
    fn live_embed_substitutes_thumbnail_template() {
        let (_, embed) = live_message(&sample_record(), &sample_session(), None, now());
        let image = embed.image.unwrap().url;
        assert!(image.starts_with("https://example.com/preview-1920x1080.jpg?ts="));
        assert!(!image.contains("{width}"));
    }

    #[test]
    fn live_message_uses_default_content_without_custom_message() {
        let (content, embed) = live_message(&sample_record(), &sample_session(), None, now());
        assert_eq!(content, DEFAULT_ANNOUNCE);
        assert_eq!(embed.title.as_deref(), Some("Speedrunning all day"));
        assert_eq!(embed.timestamp.as_deref(), Some("2024-01-01T01:00:00Z"));
        assert!(embed.fields.is_empty());
    }

    #[test]
    fn live_message_prefers_custom_content_and_names_the_game() {
        let mut record = sample_record();
        record.custom_message = Some("go go go".into());
        let game = Game {
            id: "7".into(),
            name: "Tetris".into(),
        };
        let (content, embed) = live_message(&record, &sample_session(), Some(&game), now());
        assert_eq!(content, "go go go");
        assert_eq!(embed.fields.len(), 1);
        assert_eq!(embed.fields[0].name, "Game");
        assert_eq!(embed.fields[0].value, "Tetris");
    }

    #[test]
    fn live_embed_links_the_channel() {
        let (_, embed) = live_message(&sample_record(), &sample_session(), None, now());
        assert_eq!(embed.url.as_deref(), Some("https://twitch.tv/somestreamer"));
        let author = embed.author.unwrap();
        assert_eq!(author.name, "SomeStreamer");
        assert!(author.icon_url.unwrap().contains("?ts="));
        assert_eq!(embed.description.as_deref(), Some("I play games"));
    }

    #[test]
    fn offline_message_without_vod() {
        let (content, embed) = offline_message(&sample_record(), now());
        assert_eq!(content, "SomeStreamer is not online anymore.");
        assert_eq!(embed.title, None);
        assert!(embed.fields.is_empty());
        assert_eq!(embed.footer.unwrap().text, "Last online");
        assert!(
            embed
                .image
                .unwrap()
                .url
                .starts_with("https://example.com/offline.png?ts=")
        );
    }

    #[test]
    fn offline_message_links_the_vod() {
        let mut record = sample_record();
        record.last_vod_summary = Some(VodSummary {
            title: "Speedrunning all day".into(),
            url: "https://twitch.tv/videos/555".into(),
        });
        let (content, embed) = offline_message(&record, now());
        assert_eq!(
            content,
            "SomeStreamer is not online anymore. Check out the VOD!"
        );
        assert_eq!(embed.title.as_deref(), Some("Speedrunning all day"));
        assert_eq!(embed.fields.len(), 1);
        assert_eq!(embed.fields[0].name, "VOD");
        assert_eq!(embed.fields[0].value, "[Link](https://twitch.tv/videos/555)");
    }

    #[test]
    fn offline_message_falls_back_to_channel_name() {
        let mut record = sample_record();
        record.cached_user = None;
        let (content, embed) = offline_message(&record, now());
        assert_eq!(content, "somestreamer is not online anymore.");
        assert!(embed.author.is_none());
    }

    #[test]
    fn message_payload_serializes_single_embed() {
        let (content, embed) = live_message(&sample_record(), &sample_session(), None, now());
        let payload = serde_json::to_value(MessagePayload {
            content: &content,
            embeds: [&embed],
        })
        .unwrap();
        assert_eq!(payload["embeds"].as_array().unwrap().len(), 1);
        assert_eq!(payload["embeds"][0]["footer"]["text"], "Started streaming");
        // Absent optional parts must not serialize as null.
        assert!(payload["embeds"][0].get("fields").is_none());
    }
}
