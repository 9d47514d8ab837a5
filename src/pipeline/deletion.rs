//! Deletion Pipeline (spec §4.5): batch, delete, retain-on-failure.
//!
//! Unlike the Transmit phase, delete has no attempt limit — a location that
//! fails to delete simply stays in `deletion_index` and is retried on a
//! later tick until it succeeds (spec §4.5: modem storage is finite but a
//! stuck delete is not the embedder's problem to solve).

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::error::GatewayError;
use crate::gateway::{DeletionRecord, GatewayInner};

#[instrument(name = "pipeline::deletion::run", skip_all, level = "debug")]
pub async fn run(inner: &Arc<GatewayInner>) {
    let batch = {
        let mut index = inner.deletion_index.lock().await;
        let cap = inner.options.delete_batch_size.saturating_sub(1);
        let mut locations: Vec<i64> = index.keys().copied().collect();
        locations.sort_unstable();
        locations.truncate(cap);

        let mut batch = Vec::with_capacity(locations.len());
        for loc in &locations {
            if let Some(record) = index.remove(loc) {
                batch.push((*loc, record));
            }
        }
        batch
    };

    if batch.is_empty() {
        return;
    }

    // Locations follow the subcommand name directly in the argument vector
    // (spec §4.5 "Run the helper with delete followed by those locations").
    let mut args = Vec::with_capacity(1 + batch.len());
    args.push("delete".to_string());
    args.extend(batch.iter().map(|(loc, _)| loc.to_string()));

    let root = match inner.runner.run(&args).await {
        Ok(v) => v,
        Err(e) => {
            inner.emit_error(e, None).await;
            restore(inner, batch).await;
            return;
        }
    };

    let succeeded = match parse_succeeded(root) {
        Ok(set) => set,
        Err(e) => {
            inner.emit_error(e, None).await;
            restore(inner, batch).await;
            return;
        }
    };

    let mut index = inner.deletion_index.lock().await;
    for (loc, record) in batch {
        if !succeeded.contains(&loc) {
            index.insert(loc, record);
        }
    }
}

/// `delete` returns `{ detail: { "<location>": "ok" | other, … } }` (spec §6,
/// §8 scenario 6) — a string-keyed verdict map nested under `detail`, not an
/// array.
fn parse_succeeded(root: Value) -> Result<HashSet<i64>, GatewayError> {
    let detail = match root.get("detail") {
        Some(Value::Object(detail)) => detail,
        _ => {
            return Err(GatewayError::SubprocessParse {
                cause: format!("expected a JSON object under `detail` from delete, got {root:?}"),
            })
        }
    };

    let mut succeeded = HashSet::new();
    for (location, result) in detail {
        let Ok(location) = location.parse::<i64>() else {
            continue;
        };
        if result.as_str() == Some("ok") {
            succeeded.insert(location);
        }
    }
    Ok(succeeded)
}

async fn restore(inner: &Arc<GatewayInner>, batch: Vec<(i64, DeletionRecord)>) {
    let mut index = inner.deletion_index.lock().await;
    for (loc, record) in batch {
        index.insert(loc, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayOptions;
    use crate::gateway::Gateway;
    use crate::subprocess::test_support::FakeRunner;
    use serde_json::json;

    async fn seed(gateway: &Gateway, locations: &[i64]) {
        let mut index = gateway.inner.deletion_index.lock().await;
        for loc in locations {
            index.insert(
                *loc,
                DeletionRecord {
                    from: "+1".to_string(),
                    composite_id: None,
                },
            );
        }
    }

    #[tokio::test]
    async fn successful_delete_clears_the_index() {
        let runner = Arc::new(FakeRunner::new(vec![Ok(json!({
            "detail": {"1": "ok", "2": "ok"}
        }))]));
        let gateway = Gateway::with_runner(GatewayOptions::default(), runner);
        seed(&gateway, &[1, 2]).await;

        run(&gateway.inner).await;

        assert!(gateway.inner.deletion_index.lock().await.is_empty());
    }

    #[tokio::test]
    async fn partial_success_retains_only_the_failed_locations() {
        let runner = Arc::new(FakeRunner::new(vec![Ok(json!({
            "detail": {"1": "ok", "2": "modem busy"}
        }))]));
        let gateway = Gateway::with_runner(GatewayOptions::default(), runner);
        seed(&gateway, &[1, 2]).await;

        run(&gateway.inner).await;

        let index = gateway.inner.deletion_index.lock().await;
        assert!(!index.contains_key(&1));
        assert!(index.contains_key(&2));
    }

    #[tokio::test]
    async fn batch_cap_is_one_less_than_configured_size() {
        let mut opts = GatewayOptions::default();
        opts.delete_batch_size = 2;
        let runner = Arc::new(FakeRunner::new(vec![Ok(json!({
            "detail": {"1": "ok"}
        }))]));
        let gateway = Gateway::with_runner(opts, runner);
        seed(&gateway, &[1, 2, 3]).await;

        run(&gateway.inner).await;

        // cap = 2 - 1 = 1 drained (location 1), locations 2 and 3 remain
        // untouched in the index.
        let index = gateway.inner.deletion_index.lock().await;
        assert_eq!(index.len(), 2);
        assert!(index.contains_key(&2));
        assert!(index.contains_key(&3));
    }
}
