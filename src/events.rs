//! Event Dispatcher / Handler Registry (spec §4.7).
//!
//! The JS-shaped `on(eventName, handler)` contract is expressed here as a
//! small typed registry: each recognized event name accepts exactly one
//! handler shape, and registering an unknown name or a handler of the wrong
//! shape for a known name is an error, matching spec §6's
//! "Throws on unknown event name or non-function handler".

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::model::Message;
use crate::segment_store::SegmentStore;

/// Terminal delivery of a (single or reassembled) message.
#[async_trait]
pub trait ReceiveHandler: Send + Sync {
    async fn on_receive(&self, message: &Message) -> Result<(), GatewayError>;
}

/// Fire-and-forget notification that a message was sent.
#[async_trait]
pub trait TransmitHandler: Send + Sync {
    async fn on_transmit(&self, to: &str, content: &str, result: &str);
}

/// Any-scope error notification (spec §4.7: `global`, `receive`, `transmit`).
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn on_error(&self, error: &GatewayError, message: Option<&Message>);
}

/// The six event names spec.md §4.7 recognizes — no others are legal.
pub const KNOWN_EVENTS: [&str; 6] = [
    "receive",
    "transmit",
    "error",
    "receive_segment",
    "return_segments",
    "release_segments",
];

/// A handler value ready to register under one of [`KNOWN_EVENTS`].
///
/// `receive_segment`, `return_segments`, and `release_segments` are all
/// satisfied by a single [`SegmentStore`] implementation (spec component 2
/// groups persistence of one part, lookup of known parts, and eviction
/// together) — registering any of the three names with a
/// `Handler::SegmentStore` replaces the whole store.
pub enum Handler {
    Receive(Arc<dyn ReceiveHandler>),
    Transmit(Arc<dyn TransmitHandler>),
    Error(Arc<dyn ErrorHandler>),
    SegmentStore(Arc<dyn SegmentStore>),
}

#[derive(Default)]
pub(crate) struct Handlers {
    pub receive: Option<Arc<dyn ReceiveHandler>>,
    pub transmit: Option<Arc<dyn TransmitHandler>>,
    pub error: Option<Arc<dyn ErrorHandler>>,
    pub segment_store: Option<Arc<dyn SegmentStore>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `event`. Rejects unknown names and
    /// handler/event shape mismatches (spec §6).
    pub fn register(&mut self, event: &str, handler: Handler) -> Result<(), GatewayError> {
        if !KNOWN_EVENTS.contains(&event) {
            return Err(GatewayError::InvalidEvent(event.to_string()));
        }

        match (event, handler) {
            ("receive", Handler::Receive(h)) => {
                self.receive = Some(h);
                Ok(())
            }
            ("transmit", Handler::Transmit(h)) => {
                self.transmit = Some(h);
                Ok(())
            }
            ("error", Handler::Error(h)) => {
                self.error = Some(h);
                Ok(())
            }
            ("receive_segment" | "return_segments" | "release_segments", Handler::SegmentStore(h)) => {
                self.segment_store = Some(h);
                Ok(())
            }
            _ => Err(GatewayError::InvalidEvent(format!(
                "handler shape does not match event {event:?}"
            ))),
        }
    }

    pub async fn emit_error(&self, error: GatewayError, message: Option<&Message>) {
        tracing::error!(scope = ?error.scope(), error = %error, "gateway error");
        if let Some(handler) = &self.error {
            handler.on_error(&error, message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransmitReceipt;

    struct NoopReceive;
    #[async_trait]
    impl ReceiveHandler for NoopReceive {
        async fn on_receive(&self, _message: &Message) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    struct NoopTransmit;
    #[async_trait]
    impl TransmitHandler for NoopTransmit {
        async fn on_transmit(&self, _to: &str, _content: &str, _result: &str) {}
    }

    #[allow(dead_code)]
    fn receipt_is_constructible() -> TransmitReceipt {
        TransmitReceipt {
            to: "+1".into(),
            content: "hi".into(),
            result: "success".into(),
        }
    }

    #[test]
    fn rejects_unknown_event_name() {
        let mut handlers = Handlers::new();
        let err = handlers
            .register("does_not_exist", Handler::Receive(Arc::new(NoopReceive)))
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidEvent(_)));
    }

    #[test]
    fn rejects_handler_shape_mismatch() {
        let mut handlers = Handlers::new();
        let err = handlers
            .register("receive", Handler::Transmit(Arc::new(NoopTransmit)))
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidEvent(_)));
    }

    #[test]
    fn accepts_matching_handler() {
        let mut handlers = Handlers::new();
        handlers
            .register("receive", Handler::Receive(Arc::new(NoopReceive)))
            .unwrap();
        assert!(handlers.receive.is_some());
    }
}
