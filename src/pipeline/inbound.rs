//! Inbound Pipeline (spec §4.3): retrieve, transform, route, reassemble,
//! deliver.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::instrument;

use crate::error::GatewayError;
use crate::gateway::{DeletionRecord, GatewayInner};
use crate::model::{Message, RawRecord, Segment};
use crate::reassembly;

#[instrument(name = "pipeline::inbound::run", skip_all, level = "debug")]
pub async fn run(inner: &Arc<GatewayInner>) {
    let root = match inner.runner.run(&["retrieve".to_string()]).await {
        Ok(v) => v,
        Err(e) => {
            inner.emit_error(e, None).await;
            return;
        }
    };

    let records_json = match root {
        serde_json::Value::Array(items) => items,
        other => {
            inner
                .emit_error(
                    GatewayError::SubprocessParse {
                        cause: format!("expected a JSON array from retrieve, got {other:?}"),
                    },
                    None,
                )
                .await;
            return;
        }
    };

    // Locations covered by a composite already delivered earlier in this
    // same poll (per-poll reassembly index, spec §4.3 step b / Glossary).
    let mut covered_this_poll: HashSet<i64> = HashSet::new();

    for record_json in records_json {
        let raw: RawRecord = match serde_json::from_value(record_json) {
            Ok(r) => r,
            Err(e) => {
                inner
                    .emit_error(
                        GatewayError::ReceiveError {
                            message: format!("failed to transform record: {e}"),
                        },
                        None,
                    )
                    .await;
                continue;
            }
        };

        if raw.total_segments <= 1 {
            inner.inbound_queue.lock().await.push(Message::single(raw));
            continue;
        }

        process_segment(inner, raw, &mut covered_this_poll).await;
    }

    deliver_incoming(inner).await;
}

async fn process_segment(
    inner: &Arc<GatewayInner>,
    raw: RawRecord,
    covered_this_poll: &mut HashSet<i64>,
) {
    let segment = Segment::from_raw(raw);
    let store = inner.segment_store().await;

    let should_delete = match store.receive_segment(&segment).await {
        Ok(flag) => flag,
        Err(e) => {
            inner
                .emit_error(
                    GatewayError::ReceiveError {
                        message: format!("receive_segment failed: {e}"),
                    },
                    None,
                )
                .await;
            false
        }
    };

    if covered_this_poll.contains(&segment.location) {
        tracing::trace!(
            location = segment.location,
            "segment belongs to a composite already delivered this poll, skipping"
        );
        return;
    }

    if should_delete {
        inner.deletion_index.lock().await.insert(
            segment.location,
            DeletionRecord {
                from: segment.from.clone(),
                composite_id: Some(segment.id.clone()),
            },
        );
    }

    let peers = match store.return_segments(&segment.id).await {
        Ok(peers) => peers,
        Err(e) => {
            inner
                .emit_error(
                    GatewayError::ReceiveError {
                        message: format!("return_segments failed: {e}"),
                    },
                    None,
                )
                .await;
            return;
        }
    };

    match reassembly::reassemble(&segment, &peers) {
        Ok(Some(composite)) => {
            for loc in composite.location.locations() {
                covered_this_poll.insert(loc);
            }
            inner.inbound_queue.lock().await.push(composite);
        }
        Ok(None) => {
            // Not yet complete; the segment stays on the modem unless it was
            // already scheduled for deletion above.
        }
        Err(e) => {
            inner
                .emit_error(
                    GatewayError::ReceiveError {
                        message: e.to_string(),
                    },
                    None,
                )
                .await;
        }
    }
}

/// Drain `inbound_queue`, handing each message to the `receive` handler and
/// scheduling its locations for deletion on success (spec §4.3).
async fn deliver_incoming(inner: &Arc<GatewayInner>) {
    let queued: Vec<Message> = std::mem::take(&mut *inner.inbound_queue.lock().await);
    if queued.is_empty() {
        return;
    }

    let mut joins = JoinSet::new();
    for message in queued {
        let inner = Arc::clone(inner);
        joins.spawn(async move { deliver_one(&inner, message).await });
    }
    while joins.join_next().await.is_some() {}
}

async fn deliver_one(inner: &Arc<GatewayInner>, message: Message) {
    let receive_handler = {
        let handlers = inner.handlers.lock().await;
        handlers.receive.clone()
    };

    let Some(handler) = receive_handler else {
        inner.emit_error(GatewayError::HandlerMissing, Some(&message)).await;
        return;
    };

    match handler.on_receive(&message).await {
        Ok(()) => {
            let mut deletion_index = inner.deletion_index.lock().await;
            for loc in message.location.locations() {
                deletion_index.insert(
                    loc,
                    DeletionRecord {
                        from: message.from.clone(),
                        composite_id: message.id.clone(),
                    },
                );
            }
            drop(deletion_index);

            if let Some(id) = &message.id {
                let store = inner.segment_store().await;
                store.release_segments(id).await;
            }
        }
        Err(_) => {
            // Refusal: retain for re-fetch next poll. No error event per spec §4.3.
        }
    }
}
