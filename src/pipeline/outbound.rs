//! Outbound Pipeline (spec §4.4): batch, send, retry-or-abandon.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::error::GatewayError;
use crate::gateway::GatewayInner;
use crate::model::{OutboundItem, TransmitReceipt};

#[instrument(name = "pipeline::outbound::run", skip_all, level = "debug")]
pub async fn run(inner: &Arc<GatewayInner>) {
    let batch = {
        let mut queue = inner.outbound_queue.lock().await;
        // The off-by-one: historically one fewer item than the configured
        // cap is ever drained per tick (spec §9), preserved deliberately.
        let cap = inner.options.transmit_batch_size.saturating_sub(1);
        let take = cap.min(queue.len());
        queue.drain(..take).collect::<Vec<_>>()
    };

    if batch.is_empty() {
        return;
    }

    // `to` and `content` interleaved into the argument vector, per batch
    // item, in queue order (spec §4.4 "Batch construction").
    let mut args = Vec::with_capacity(1 + batch.len() * 2);
    args.push("send".to_string());
    for item in &batch {
        args.push(item.to.clone());
        args.push(item.content.clone());
    }

    let root = match inner.runner.run(&args).await {
        Ok(v) => v,
        Err(e) => {
            inner.emit_error(e, None).await;
            requeue_front(inner, batch).await;
            return;
        }
    };

    let results = match parse_results(root) {
        Ok(r) => r,
        Err(e) => {
            inner.emit_error(e, None).await;
            requeue_front(inner, batch).await;
            return;
        }
    };

    finish_batch(inner, batch, results).await;
}

/// `result` strings keyed by 0-based `queue_index = index - 1`, per the
/// helper's own 1-based `index` field — never assumed from response array
/// order, since the helper is not required to return results in submission
/// order.
fn parse_results(root: Value) -> Result<HashMap<usize, String>, GatewayError> {
    let items = match root {
        Value::Array(items) => items,
        other => {
            return Err(GatewayError::SubprocessParse {
                cause: format!("expected a JSON array from send, got {other:?}"),
            })
        }
    };

    let mut by_index = HashMap::new();
    for item in items {
        let Some(index) = item.get("index").and_then(Value::as_u64) else {
            continue;
        };
        let Some(queue_index) = (index as usize).checked_sub(1) else {
            continue;
        };
        let result = item
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or("unknown result")
            .to_string();
        by_index.insert(queue_index, result);
    }
    Ok(by_index)
}

async fn finish_batch(
    inner: &Arc<GatewayInner>,
    batch: Vec<OutboundItem>,
    mut results: HashMap<usize, String>,
) {
    let mut survivors = Vec::new();

    for (idx, mut item) in batch.into_iter().enumerate() {
        let result = results.remove(&idx);
        match result {
            Some(result) if result == "success" => {
                inner.notify_transmit(&item.to, &item.content, &result).await;
                if let Some(cb) = item.callback.take() {
                    cb(Ok(TransmitReceipt {
                        to: item.to,
                        content: item.content,
                        result,
                    }));
                }
            }
            Some(result) => {
                item.tx_attempts += 1;
                if max_attempts_exceeded(inner, item.tx_attempts) {
                    inner
                        .emit_error(
                            GatewayError::TransmitError {
                                message: result.clone(),
                            },
                            None,
                        )
                        .await;
                    if let Some(cb) = item.callback.take() {
                        cb(Err(GatewayError::TransmitError { message: result }));
                    }
                } else {
                    survivors.push(item);
                }
            }
            None => {
                // Helper returned no result for this index; treat as a
                // transient send failure and retry.
                item.tx_attempts += 1;
                if max_attempts_exceeded(inner, item.tx_attempts) {
                    let message = "helper returned no result for this message".to_string();
                    inner
                        .emit_error(
                            GatewayError::TransmitError {
                                message: message.clone(),
                            },
                            None,
                        )
                        .await;
                    if let Some(cb) = item.callback.take() {
                        cb(Err(GatewayError::TransmitError { message }));
                    }
                } else {
                    survivors.push(item);
                }
            }
        }
    }

    if !survivors.is_empty() {
        let mut queue = inner.outbound_queue.lock().await;
        for item in survivors.into_iter().rev() {
            queue.push_front(item);
        }
    }
}

fn max_attempts_exceeded(inner: &GatewayInner, attempts: u32) -> bool {
    let max = inner.options.max_transmit_attempts;
    max != 0 && attempts >= max
}

async fn requeue_front(inner: &Arc<GatewayInner>, batch: Vec<OutboundItem>) {
    let mut queue = inner.outbound_queue.lock().await;
    for item in batch.into_iter().rev() {
        queue.push_front(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayOptions;
    use crate::gateway::Gateway;
    use crate::subprocess::test_support::FakeRunner;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn successful_send_invokes_callback_and_clears_queue() {
        let runner = Arc::new(FakeRunner::new(vec![Ok(json!([
            {"index": 1, "to": "+1", "result": "success"}
        ]))]));
        let gateway = Gateway::with_runner(GatewayOptions::default(), runner);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        gateway
            .send(
                "+1".to_string(),
                "hi".to_string(),
                Some(Box::new(move |result| {
                    assert!(result.is_ok());
                    seen2.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .await
            .unwrap();

        run(&gateway.inner).await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(gateway.inner.outbound_queue.lock().await.is_empty());
    }

    #[tokio::test]
    async fn retry_limit_abandons_after_max_attempts() {
        let mut opts = GatewayOptions::default();
        opts.max_transmit_attempts = 2;
        let runner = Arc::new(FakeRunner::new(vec![
            Ok(json!([{"index": 1, "to": "+1", "result": "no network"}])),
            Ok(json!([{"index": 1, "to": "+1", "result": "no network"}])),
        ]));
        let gateway = Gateway::with_runner(opts, runner);

        let failures = Arc::new(AtomicUsize::new(0));
        let failures2 = Arc::clone(&failures);
        gateway
            .send(
                "+1".to_string(),
                "hi".to_string(),
                Some(Box::new(move |result| {
                    if result.is_err() {
                        failures2.fetch_add(1, Ordering::SeqCst);
                    }
                })),
            )
            .await
            .unwrap();

        run(&gateway.inner).await;
        assert_eq!(failures.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.inner.outbound_queue.lock().await.len(), 1);

        run(&gateway.inner).await;
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert!(gateway.inner.outbound_queue.lock().await.is_empty());
    }

    #[tokio::test]
    async fn batch_cap_is_one_less_than_configured_size() {
        let mut opts = GatewayOptions::default();
        opts.transmit_batch_size = 3;
        let runner = Arc::new(FakeRunner::new(vec![Ok(json!([
            {"index": 1, "to": "+1", "result": "success"},
            {"index": 2, "to": "+2", "result": "success"},
        ]))]));
        let gateway = Gateway::with_runner(opts, runner);

        for n in 0..5 {
            gateway
                .send(format!("+{n}"), "hi".to_string(), None)
                .await
                .unwrap();
        }

        run(&gateway.inner).await;
        // cap = 3 - 1 = 2 drained, 3 remain queued.
        assert_eq!(gateway.inner.outbound_queue.lock().await.len(), 3);
    }
}
