//! Cycle scheduling: one reconciliation pass at startup, then one per interval.

use crate::discord::Notifier;
use crate::reconciler::Reconciler;
use crate::store::ChannelStore;
use crate::twitch::{LiveStreamApi, TokenGate};
use jiff::Timestamp;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One full pass over all channel records.
///
/// The token gate runs first and decides whether the pass happens at all; a
/// failed listing aborts the pass; a failed save loses only that channel's
/// update for this cycle. Nothing here returns an error: every failure is
/// absorbed and the next tick is the recovery mechanism.
pub async fn run_cycle<G, S, A, N>(gate: &G, store: &S, api: &A, notifier: &N)
where
    G: TokenGate,
    S: ChannelStore,
    A: LiveStreamApi,
    N: Notifier,
{
    if !gate.ensure_valid_token().await {
        tracing::warn!("no usable app access token, skipping this cycle");
        return;
    }

    let records = match store.list_all().await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(error = %e, "listing channel records failed, aborting cycle");
            return;
        }
    };

    tracing::info!(records = records.len(), "starting reconciliation pass");
    let reconciler = Reconciler::new(api, notifier);
    for mut record in records {
        reconciler.reconcile(&mut record, Timestamp::now()).await;
        // Written back even when unchanged; the store update is idempotent.
        if let Err(e) = store.save(&record).await {
            tracing::error!(
                channel = %record.channel_name,
                error = %e,
                "persisting channel record failed, update lost until next cycle"
            );
        }
    }
    tracing::info!("reconciliation pass complete");
}

/// Runs [`run_cycle`] immediately and then once per `interval`, forever.
///
/// An in-progress flag guarantees two passes never overlap: a tick that fires
/// while the previous pass is still running is skipped outright rather than
/// queued.
pub async fn run<G, S, A, N>(gate: G, store: S, api: A, notifier: N, interval: Duration)
where
    G: TokenGate + Send + Sync + 'static,
    S: ChannelStore + Send + Sync + 'static,
    A: LiveStreamApi + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let deps = Arc::new((gate, store, api, notifier));
    let in_flight = Arc::new(AtomicBool::new(false));
    let mut ticker = tokio::time::interval(interval);

    loop {
        // The first tick completes immediately, giving the startup pass.
        ticker.tick().await;

        if in_flight.swap(true, Ordering::AcqRel) {
            tracing::warn!("previous cycle still running, skipping this tick");
            continue;
        }

        let deps = Arc::clone(&deps);
        let in_flight = Arc::clone(&in_flight);
        tokio::spawn(async move {
            let (gate, store, api, notifier) = &*deps;
            run_cycle(gate, store, api, notifier).await;
            in_flight.store(false, Ordering::Release);
        });
    }
}
