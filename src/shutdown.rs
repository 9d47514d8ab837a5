//! Graceful-stop signal, built on top of a broadcast channel.
//!
//! The Poll Scheduler subscribes once per `start()` call; `stop()` triggers
//! the broadcast so a scheduler currently sleeping between ticks wakes
//! immediately instead of waiting out the rest of `poll_interval`. A tick
//! already in flight is never interrupted — the scheduler only checks for
//! shutdown between ticks (spec §4.2).

use tokio::sync::broadcast;

#[derive(Clone)]
pub(crate) struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Shutdown { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}
