//! Segment Store Interface (spec §4 component 2) and its built-in in-memory
//! default, used when the embedder registers no `receive_segment` /
//! `return_segments` handlers (spec §4.7 "fall back to the in-memory
//! default backed by `segment_cache`").

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::model::Segment;

/// Abstract persistence for inbound multi-part segments.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Persist one segment. Returns `Ok(true)` if it has been durably
    /// persisted and the modem copy is now safe to delete, `Ok(false)` if
    /// not yet safe, or `Err` if persistence failed (treated as not
    /// persisted, and reported via a `ReceiveError` event — spec §7).
    async fn receive_segment(&self, segment: &Segment) -> Result<bool, GatewayError>;

    /// Return all segments currently known for a composite `id`.
    async fn return_segments(&self, id: &str) -> Result<Vec<Segment>, GatewayError>;

    /// The composite for `id` has been delivered; stored parts may be
    /// discarded.
    async fn release_segments(&self, id: &str);
}

/// Default store used when the embedder supplies none: keeps segments in
/// volatile memory only, never reports a segment as safe to delete on its
/// own, and evicts its cache entry on `release_segments`.
///
/// This resolves the open question in spec §9 about the default store never
/// clearing `segment_cache`: rather than grow unboundedly, eviction happens
/// here.
#[derive(Debug, Default)]
pub struct InMemorySegmentStore {
    cache: Mutex<HashMap<String, Vec<Segment>>>,
}

impl InMemorySegmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SegmentStore for InMemorySegmentStore {
    async fn receive_segment(&self, segment: &Segment) -> Result<bool, GatewayError> {
        let mut cache = self.cache.lock().unwrap();
        cache.entry(segment.id.clone()).or_default().push(segment.clone());
        Ok(false)
    }

    async fn return_segments(&self, id: &str) -> Result<Vec<Segment>, GatewayError> {
        let cache = self.cache.lock().unwrap();
        Ok(cache.get(id).cloned().unwrap_or_default())
    }

    async fn release_segments(&self, id: &str) {
        self.cache.lock().unwrap().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn seg(id: &str, n: u32) -> Segment {
        Segment {
            id: id.to_string(),
            location: n as i64,
            from: "+1".to_string(),
            content: format!("part{n}"),
            udh: Some(7),
            segment: n,
            total_segments: 2,
            timestamp: Utc::now(),
            smsc_timestamp: None,
        }
    }

    #[tokio::test]
    async fn default_store_caches_and_never_authorizes_delete() {
        let store = InMemorySegmentStore::new();
        let should_delete = store.receive_segment(&seg("a-7-2", 1)).await.unwrap();
        assert!(!should_delete);

        let parts = store.return_segments("a-7-2").await.unwrap();
        assert_eq!(parts.len(), 1);
    }

    #[tokio::test]
    async fn release_segments_evicts_cache_entry() {
        let store = InMemorySegmentStore::new();
        store.receive_segment(&seg("a-7-2", 1)).await.unwrap();
        store.release_segments("a-7-2").await;

        let parts = store.return_segments("a-7-2").await.unwrap();
        assert!(parts.is_empty());
    }
}
