//! Periodic broadcast tasks and the population-event fan-out.
//!
//! Two independent timers, deliberately not one shared loop: poses change
//! every tick, the set of live bodies changes rarely. A third task drains
//! the registry's population-event channel so viewers hear about
//! create/remove immediately instead of waiting for the next list tick.
//! None of these tasks is triggered by client activity; together they give
//! low-latency change notice plus a periodic reconciliation safety net.
//!
//! Every task snapshots shared state first, releases the lock, then
//! serializes and fans out, so a slow viewer never blocks the connection
//! handlers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use posecast_proto::{Frame, encode};

use crate::clients::ClientTable;
use crate::registry::{BodyRegistry, PopulationEvent};

/// Fast tick: one `Pose` frame per body per interval (~60 Hz default).
pub async fn pose_tick_loop(
    registry: Arc<BodyRegistry>,
    clients: Arc<ClientTable>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for body in registry.snapshot().await {
                    let frame = encode(&Frame::Pose {
                        body_id: body.id.0,
                        joints: body.joints,
                    });
                    clients.broadcast(Arc::from(frame)).await;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

/// Slow tick: the full sorted population list, so a viewer that missed a
/// create/remove event still converges.
pub async fn population_tick_loop(
    registry: Arc<BodyRegistry>,
    clients: Arc<ClientTable>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ids = registry.population().await;
                let frame = encode(&Frame::Population {
                    body_ids: ids.into_iter().map(|id| id.0).collect(),
                });
                clients.broadcast(Arc::from(frame)).await;
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

/// Control-plane fan-out: relays each create/remove event as a `1`/`0`
/// frame the moment the registry emits it.
pub async fn population_event_loop(
    clients: Arc<ClientTable>,
    mut events: mpsc::UnboundedReceiver<PopulationEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let frame = match event {
                    PopulationEvent::Appeared(id) => encode(&Frame::BodyAppeared { body_id: id.0 }),
                    PopulationEvent::Removed(id) => encode(&Frame::BodyRemoved { body_id: id.0 }),
                };
                clients.broadcast(Arc::from(frame)).await;
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
