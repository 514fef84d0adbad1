//! Process configuration, read from the environment at startup.

use eyre::Context;
use std::net::SocketAddr;
use std::time::Duration;

/// Everything the service needs to know before its first cycle.
#[derive(Debug, Clone)]
pub struct Config {
    /// Twitch application client id, sent as the `Client-Id` header on every
    /// Helix call.
    pub twitch_client_id: String,
    /// Twitch application client secret, used by the token guard's
    /// client-credentials exchange.
    pub twitch_client_secret: String,
    /// Initial app access token. May be empty: the first cycle's guard probe
    /// then fails with a 401 and mints a fresh one.
    pub twitch_token: String,
    /// Discord bot token.
    pub discord_token: String,
    /// CouchDB server root, e.g. `http://couch:5984`.
    pub couchdb_url: String,
    /// Database holding one document per tracked channel.
    pub couchdb_database: String,
    /// Bind address for the liveness probe.
    pub health_addr: SocketAddr,
    /// Time between reconciliation cycles.
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        Ok(Self {
            twitch_client_id: required("TWITCH_CLIENT_ID")?,
            twitch_client_secret: required("TWITCH_CLIENT_SECRET")?,
            twitch_token: optional("TWITCH_TOKEN").unwrap_or_default(),
            discord_token: required("DISCORD_TOKEN")?,
            couchdb_url: required("COUCHDB_URL")?,
            couchdb_database: optional("COUCHDB_DATABASE")
                .unwrap_or_else(|| "twitch-info".to_string()),
            health_addr: optional("HEALTH_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string())
                .parse()
                .context("parse HEALTH_ADDR as a socket address")?,
            poll_interval: Duration::from_secs(
                optional("POLL_INTERVAL_SECS")
                    .map(|v| v.parse())
                    .transpose()
                    .context("parse POLL_INTERVAL_SECS as seconds")?
                    .unwrap_or(300),
            ),
        })
    }
}

fn required(name: &str) -> eyre::Result<String> {
    std::env::var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
