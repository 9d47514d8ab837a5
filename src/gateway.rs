//! Public API (spec §4.9, §6): `create`, `start`, `stop`, `send`, `on`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::config::GatewayOptions;
use crate::error::GatewayError;
use crate::events::{Handler, Handlers};
use crate::model::{Message, OutboundItem, TransmitCallback};
use crate::scheduler;
use crate::segment_store::{InMemorySegmentStore, SegmentStore};
use crate::shutdown::Shutdown;
use crate::subprocess::{SubprocessRunner, TokioSubprocessRunner};

/// What a deletion-index entry remembers about the location it owns (spec
/// §3: "mapping from modem location to the message record that owns it").
#[derive(Debug, Clone)]
pub(crate) struct DeletionRecord {
    pub from: String,
    pub composite_id: Option<String>,
}

pub(crate) struct GatewayInner {
    pub options: GatewayOptions,
    pub runner: Arc<dyn SubprocessRunner>,
    pub default_segment_store: Arc<dyn SegmentStore>,
    pub handlers: Mutex<Handlers>,
    pub inbound_queue: Mutex<Vec<Message>>,
    pub outbound_queue: Mutex<VecDeque<OutboundItem>>,
    pub deletion_index: Mutex<HashMap<i64, DeletionRecord>>,
    pub is_polling: AtomicBool,
    pub shutdown: Shutdown,
}

impl GatewayInner {
    pub async fn segment_store(&self) -> Arc<dyn SegmentStore> {
        let handlers = self.handlers.lock().await;
        handlers
            .segment_store
            .clone()
            .unwrap_or_else(|| self.default_segment_store.clone())
    }

    pub async fn emit_error(&self, error: GatewayError, message: Option<&Message>) {
        let handlers = self.handlers.lock().await;
        handlers.emit_error(error, message).await;
    }

    pub async fn notify_transmit(&self, to: &str, content: &str, result: &str) {
        let handlers = self.handlers.lock().await;
        if let Some(handler) = &handlers.transmit {
            handler.on_transmit(to, content, result).await;
        }
    }
}

/// The running coordinator between an embedding application and the
/// `gammu-json` helper. One instance drives one modem (spec §1: "single
/// instance per modem").
pub struct Gateway {
    pub(crate) inner: Arc<GatewayInner>,
    scheduler_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Build a gateway that spawns a real `gammu-json` child process.
    pub fn create(options: GatewayOptions) -> Self {
        let runner = Arc::new(TokioSubprocessRunner::new(
            options.helper_program.clone(),
            options.prefix.as_deref(),
            options.debug,
        ));
        Self::with_runner(options, runner)
    }

    /// Build a gateway against an injected [`SubprocessRunner`] — used by
    /// the demo binary to point at a stand-in helper, and by tests to avoid
    /// spawning a real child process (spec §4.11).
    pub fn with_runner(options: GatewayOptions, runner: Arc<dyn SubprocessRunner>) -> Self {
        let inner = GatewayInner {
            options,
            runner,
            default_segment_store: Arc::new(InMemorySegmentStore::new()),
            handlers: Mutex::new(Handlers::new()),
            inbound_queue: Mutex::new(Vec::new()),
            outbound_queue: Mutex::new(VecDeque::new()),
            deletion_index: Mutex::new(HashMap::new()),
            is_polling: AtomicBool::new(false),
            shutdown: Shutdown::new(),
        };

        Gateway {
            inner: Arc::new(inner),
            scheduler_handle: Mutex::new(None),
        }
    }

    /// Begin polling. A no-op if already polling.
    #[instrument(name = "gateway::start", skip_all, level = "info")]
    pub async fn start(&self) {
        if self.inner.is_polling.swap(true, Ordering::SeqCst) {
            tracing::debug!("start() called while already polling, ignoring");
            return;
        }

        tracing::info!("gateway starting poll scheduler");
        let inner = Arc::clone(&self.inner);
        let shutdown_rx = self.inner.shutdown.subscribe();
        let handle = tokio::spawn(scheduler::run(inner, shutdown_rx));

        *self.scheduler_handle.lock().await = Some(handle);
    }

    /// Stop polling after the current cycle finishes. `start()` after
    /// `stop()` resumes polling.
    #[instrument(name = "gateway::stop", skip_all, level = "info")]
    pub async fn stop(&self) {
        self.inner.is_polling.store(false, Ordering::SeqCst);
        self.inner.shutdown.trigger();

        if let Some(handle) = self.scheduler_handle.lock().await.take() {
            let _ = handle.await;
        }
        tracing::info!("gateway stopped");
    }

    /// Enqueue an outbound message for the next Transmit phase (spec §4.4).
    pub async fn send(
        &self,
        to: String,
        content: String,
        callback: Option<TransmitCallback>,
    ) -> Result<(), GatewayError> {
        if to.is_empty() {
            return Err(GatewayError::InvalidArgument("to must not be empty"));
        }
        if content.is_empty() {
            return Err(GatewayError::InvalidArgument("content must not be empty"));
        }

        let item = OutboundItem::new(to, content, callback);
        self.inner.outbound_queue.lock().await.push_back(item);
        Ok(())
    }

    /// Register a handler under one of [`crate::events::KNOWN_EVENTS`].
    pub async fn on(&self, event: &str, handler: Handler) -> Result<(), GatewayError> {
        self.inner.handlers.lock().await.register(event, handler)
    }
}
