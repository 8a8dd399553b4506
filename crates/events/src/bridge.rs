//! The progress pub/sub bridge: per-run channels, subscriptions, and the
//! Postgres notification pump.
//!
//! [`ProgressHub`] is the transport-agnostic half: it validates raw
//! payloads and fans valid events out on one broadcast channel per run.
//! [`ProgressListener`] is the transport half: a background task that
//! `LISTEN`s on the shared Postgres channel and feeds the hub.

use std::collections::HashMap;
use std::sync::Arc;

use quadcalc_core::types::DbId;
use quadcalc_db::DbPool;
use sqlx::postgres::PgListener;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressEvent;

/// The Postgres NOTIFY channel all progress events travel on. Run scoping
/// happens in the hub, not in the channel name, so a single `LISTEN`
/// covers every run.
pub const PROGRESS_CHANNEL: &str = "run_progress";

/// Buffered events per subscriber before a slow consumer starts lagging.
const SUBSCRIBER_BUFFER: usize = 256;

/// The per-run channel registry shared between the hub and its
/// subscriptions.
type ChannelMap = RwLock<HashMap<DbId, broadcast::Sender<ProgressEvent>>>;

/// Drop a run's channel once it has no remaining subscribers.
async fn release_channel(channels: &ChannelMap, run_id: DbId) {
    let mut channels = channels.write().await;
    if let Some(sender) = channels.get(&run_id) {
        if sender.receiver_count() == 0 {
            channels.remove(&run_id);
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressHub
// ---------------------------------------------------------------------------

/// Per-run fan-out of validated progress events.
///
/// One broadcast channel per run id: events for different runs never
/// cross-deliver, and each subscriber sees its run's events in publish
/// order. Delivery is at-most-once with no replay -- a subscriber that
/// attaches after an event was routed has missed it.
///
/// Cheaply cloneable; clones share the same channel registry.
#[derive(Clone)]
pub struct ProgressHub {
    channels: Arc<ChannelMap>,
}

impl ProgressHub {
    /// Create a hub with no active channels.
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validate and route a raw payload.
    ///
    /// Anything that does not deserialize into a [`ProgressEvent`] (bad
    /// JSON, unknown operation/status values) is dropped and logged; it
    /// never reaches a subscriber and never panics the pump.
    pub async fn route_raw(&self, payload: &str) {
        match serde_json::from_str::<ProgressEvent>(payload) {
            Ok(event) => self.route(event).await,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed progress event");
            }
        }
    }

    /// Route a validated event to its run's subscribers.
    ///
    /// With no subscribers for the run the event is silently dropped
    /// (clients reconcile through the snapshot endpoint).
    pub async fn route(&self, event: ProgressEvent) {
        let run_id = event.run_id;
        let all_receivers_gone = {
            let channels = self.channels.read().await;
            match channels.get(&run_id) {
                Some(sender) => sender.send(event).is_err(),
                None => false,
            }
        };

        // Every subscriber dropped without unsubscribing; reap the channel.
        if all_receivers_gone {
            release_channel(&self.channels, run_id).await;
        }
    }

    /// Attach a new subscriber to a run's channel, creating the channel if
    /// this is the run's first subscriber.
    pub async fn subscribe(&self, run_id: DbId) -> ProgressSubscription {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(run_id)
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_BUFFER).0);
        ProgressSubscription {
            channels: Arc::clone(&self.channels),
            run_id,
            receiver: Some(sender.subscribe()),
        }
    }

    /// Number of runs with an active channel.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ProgressSubscription
// ---------------------------------------------------------------------------

/// A live subscription to one run's progress events.
///
/// Call [`recv`](Self::recv) in a loop until it returns `None`, then (or at
/// any earlier point) [`unsubscribe`](Self::unsubscribe). Unsubscribing is
/// idempotent; it releases the underlying channel when the last subscriber
/// leaves. Dropping without unsubscribing is safe -- the channel is reaped
/// on the next routed event instead.
pub struct ProgressSubscription {
    channels: Arc<ChannelMap>,
    run_id: DbId,
    receiver: Option<broadcast::Receiver<ProgressEvent>>,
}

impl ProgressSubscription {
    /// The run this subscription is attached to.
    pub fn run_id(&self) -> DbId {
        self.run_id
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the subscription has been unsubscribed or the
    /// channel is closed. A lagged subscriber skips the overwritten events
    /// and keeps receiving from the oldest retained one.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        run_id = self.run_id,
                        skipped,
                        "Progress subscriber lagged",
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Detach from the channel and release it if this was the last
    /// subscriber. Safe to call any number of times.
    pub async fn unsubscribe(&mut self) {
        if self.receiver.take().is_some() {
            release_channel(&self.channels, self.run_id).await;
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressListener
// ---------------------------------------------------------------------------

/// Background pump from Postgres `LISTEN` into a [`ProgressHub`].
///
/// Owns the hub; API handlers subscribe through
/// [`subscribe`](Self::subscribe). The pump task runs until
/// [`shutdown`](Self::shutdown) is called.
pub struct ProgressListener {
    hub: ProgressHub,
    cancel: CancellationToken,
}

impl ProgressListener {
    /// Connect a dedicated listener connection, `LISTEN` on the progress
    /// channel, and spawn the pump task.
    pub async fn start(pool: &DbPool) -> Result<Arc<Self>, sqlx::Error> {
        let mut pg_listener = PgListener::connect_with(pool).await?;
        pg_listener.listen(PROGRESS_CHANNEL).await?;

        let hub = ProgressHub::new();
        let cancel = CancellationToken::new();

        let pump_hub = hub.clone();
        let pump_cancel = cancel.clone();
        tokio::spawn(async move {
            tracing::info!(channel = PROGRESS_CHANNEL, "Progress listener started");
            loop {
                tokio::select! {
                    _ = pump_cancel.cancelled() => {
                        tracing::info!("Progress listener shutting down");
                        break;
                    }
                    notification = pg_listener.recv() => match notification {
                        Ok(n) => pump_hub.route_raw(n.payload()).await,
                        Err(e) => {
                            // PgListener re-establishes its connection on the
                            // next recv; in-flight notifications are lost,
                            // which at-most-once delivery already allows.
                            tracing::warn!(error = %e, "Progress listener connection error");
                        }
                    }
                }
            }
        });

        Ok(Arc::new(Self { hub, cancel }))
    }

    /// Attach a subscriber to a run's event stream.
    pub async fn subscribe(&self, run_id: DbId) -> ProgressSubscription {
        self.hub.subscribe(run_id).await
    }

    /// The underlying hub (used by tests and diagnostics).
    pub fn hub(&self) -> ProgressHub {
        self.hub.clone()
    }

    /// Stop the pump task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
