//! The channel store: where tracked-channel records live between cycles.
//!
//! The store is a narrow collaborator: list every record, write one record back.
//! There are no transactions across records and no deletes; each document has an
//! independent lifecycle and CouchDB's per-document `_rev` is the only
//! concurrency control.

use crate::record::ChannelRecord;
use eyre::Context;
use serde::Deserialize;
use std::future::Future;
use tracing::instrument;

/// Persistence boundary for [`ChannelRecord`]s.
///
/// Implemented by [`CouchDbStore`] for production and by fakes in the
/// scheduler's tests.
pub trait ChannelStore {
    /// Every tracked channel record.
    fn list_all(&self) -> impl Future<Output = eyre::Result<Vec<ChannelRecord>>> + Send;

    /// Writes one record back, whole-document. Idempotent from the caller's
    /// perspective; called once per channel per cycle even when nothing changed.
    fn save(&self, record: &ChannelRecord) -> impl Future<Output = eyre::Result<()>> + Send;
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    docs: Vec<ChannelRecord>,
}

/// [`ChannelStore`] backed by a CouchDB-compatible HTTP document store.
#[derive(Debug, Clone)]
pub struct CouchDbStore {
    http: reqwest::Client,
    base_url: String,
    database: String,
}

impl CouchDbStore {
    /// `base_url` is the server root (no trailing slash needed); `database` the
    /// database holding one document per tracked channel.
    pub fn new(http: reqwest::Client, base_url: String, database: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            database,
        }
    }
}

impl ChannelStore for CouchDbStore {
    /// Lists all channel documents via `_find`.
    ///
    /// The `_id > "0"` selector matches every seeded document; the seeding
    /// tooling uses the same selector.
    #[instrument(skip(self))]
    async fn list_all(&self) -> eyre::Result<Vec<ChannelRecord>> {
        let url = format!("{}/{}/_find", self.base_url, self.database);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "selector": { "_id": { "$gt": "0" } },
            }))
            .send()
            .await
            .context("send _find request to channel store")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "channel store _find failed with status {status}: {body}"
            ));
        }

        let found: FindResponse = response
            .json()
            .await
            .context("parse channel store _find response as JSON")?;

        tracing::debug!(records = found.docs.len(), "listed channel records");
        Ok(found.docs)
    }

    /// Writes the record back via `PUT /{db}/{id}` with its current `_rev`.
    #[instrument(skip(self, record), fields(channel = %record.channel_name))]
    async fn save(&self, record: &ChannelRecord) -> eyre::Result<()> {
        let url = format!("{}/{}/{}", self.base_url, self.database, record.id);
        let response = self
            .http
            .put(&url)
            .json(record)
            .send()
            .await
            .context("send document update to channel store")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "channel store update failed with status {status}: {body}"
            ));
        }

        tracing::debug!("persisted channel record");
        Ok(())
    }
}
