//! Poll Scheduler (spec §4.2).
//!
//! Runs receive, delete, transmit in order on every tick, always completing
//! all three regardless of any phase's outcome, then sleeps a full
//! `poll_interval` before the next tick — measured from this tick's
//! completion, not its start.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::instrument;

use crate::gateway::GatewayInner;
use crate::pipeline::{deletion, inbound, outbound};

#[instrument(name = "scheduler::run", skip_all, level = "debug")]
pub(crate) async fn run(inner: Arc<GatewayInner>, mut shutdown_rx: broadcast::Receiver<()>) {
    while inner.is_polling.load(Ordering::SeqCst) {
        tracing::debug!("poll tick starting");

        inbound::run(&inner).await;
        deletion::run(&inner).await;
        outbound::run(&inner).await;

        tracing::debug!("poll tick complete");

        if !inner.is_polling.load(Ordering::SeqCst) {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(inner.options.poll_interval()) => {}
            _ = shutdown_rx.recv() => {
                tracing::debug!("scheduler received shutdown signal between ticks");
                break;
            }
        }
    }
}
