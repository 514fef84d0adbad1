//! Announces Twitch live streams in Discord.
//!
//! The service polls the Twitch Helix API on a fixed interval, detects
//! offline→live and live→offline transitions for a configured set of channels,
//! and posts (then later edits) a rich announcement message in Discord.
//! Per-channel state lives in a CouchDB document store so restarts and repeated
//! cycles never duplicate an announcement.
//!
//! Module map:
//!
//! - [`twitch`] - Helix lookups and the app-access-token guard
//! - [`discord`] - announcement embeds and the Discord REST notifier
//! - [`store`] - the channel-record document store
//! - [`record`] - the per-channel document model and caching policy
//! - [`reconciler`] - the per-channel state machine (the interesting part)
//! - [`scheduler`] - the fixed-interval cycle driver
//! - [`config`], [`health`] - process plumbing

pub mod config;
pub mod discord;
pub mod health;
pub mod reconciler;
pub mod record;
pub mod scheduler;
pub mod store;
pub mod twitch;
