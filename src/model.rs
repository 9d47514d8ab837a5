//! Message records, as received from the helper and as derived by the core
//! (spec §3 "Data model").

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::GatewayError;

/// One record as emitted by `gammu-json retrieve`, before the core has
/// computed any derived fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub location: i64,
    pub from: String,
    pub content: String,
    pub udh: Option<i64>,
    pub segment: u32,
    pub total_segments: u32,
    #[serde(with = "helper_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, with = "helper_timestamp_opt")]
    pub smsc_timestamp: Option<DateTime<Utc>>,
}

/// One part of a concatenated SMS, after the core has assigned its
/// composite `id` (spec §3 "Derived fields").
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: String,
    pub location: i64,
    pub from: String,
    pub content: String,
    pub udh: Option<i64>,
    pub segment: u32,
    pub total_segments: u32,
    pub timestamp: DateTime<Utc>,
    pub smsc_timestamp: Option<DateTime<Utc>>,
}

impl Segment {
    /// Compute the composite key a concatenated SMS's parts share
    /// (`<from>-<udh|0>-<total_segments>`, spec §3).
    pub fn composite_id(from: &str, udh: Option<i64>, total_segments: u32) -> String {
        format!("{from}-{}-{total_segments}", udh.unwrap_or(0))
    }

    /// Build a [`Segment`] from a raw helper record known to be multi-part.
    pub fn from_raw(raw: RawRecord) -> Self {
        let id = Self::composite_id(&raw.from, raw.udh, raw.total_segments);
        Segment {
            id,
            location: raw.location,
            from: raw.from,
            content: raw.content,
            udh: raw.udh,
            segment: raw.segment,
            total_segments: raw.total_segments,
            timestamp: raw.timestamp,
            smsc_timestamp: raw.smsc_timestamp,
        }
    }
}

/// Where a delivered [`Message`]'s segments lived on the modem.
#[derive(Debug, Clone)]
pub enum MessageLocation {
    Single(i64),
    Composite(Vec<i64>),
}

impl MessageLocation {
    /// All locations owed a `delete`, regardless of single/composite shape.
    pub fn locations(&self) -> Vec<i64> {
        match self {
            MessageLocation::Single(loc) => vec![*loc],
            MessageLocation::Composite(locs) => locs.clone(),
        }
    }
}

/// A fully-received message, ready for `deliver_incoming` (spec §4.3):
/// either a lone single-part record, or a composite built by the Reassembly
/// Engine from every part sharing an `id`.
#[derive(Debug, Clone)]
pub struct Message {
    pub location: MessageLocation,
    pub from: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub smsc_timestamp: Option<DateTime<Utc>>,
    /// `None` for single-part messages; `Some(id)` for composites (spec: "id
    /// ... absent/false for single-part").
    pub id: Option<String>,
    /// `None` for single-part messages; `Some(parts)` for composites.
    pub parts: Option<Vec<Segment>>,
}

impl Message {
    pub fn single(raw: RawRecord) -> Self {
        Message {
            location: MessageLocation::Single(raw.location),
            from: raw.from,
            content: raw.content,
            timestamp: raw.timestamp,
            smsc_timestamp: raw.smsc_timestamp,
            id: None,
            parts: None,
        }
    }
}

/// Result of a completed (or permanently failed) outbound transmission,
/// handed to a per-message callback (spec §4.4).
#[derive(Debug, Clone)]
pub struct TransmitReceipt {
    pub to: String,
    pub content: String,
    pub result: String,
}

/// Invoked exactly once, either on success or on final (retry-exhausted)
/// failure (spec §9 "Per-message embedder callbacks").
pub type TransmitCallback = Box<dyn FnOnce(Result<TransmitReceipt, GatewayError>) + Send>;

/// An outbound message awaiting transmission (spec §3 "Outbound item").
pub struct OutboundItem {
    pub to: String,
    pub content: String,
    pub tx_attempts: u32,
    pub callback: Option<TransmitCallback>,
}

impl std::fmt::Debug for OutboundItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundItem")
            .field("to", &self.to)
            .field("tx_attempts", &self.tx_attempts)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl OutboundItem {
    pub fn new(to: String, content: String, callback: Option<TransmitCallback>) -> Self {
        OutboundItem {
            to,
            content,
            tx_attempts: 0,
            callback,
        }
    }
}

/// Parses timestamps the way `gammu-json` emits them: RFC3339, falling back
/// to gammu's own `YYYY-MM-DD HH:MM:SS` local-less format. The exact wire
/// shape is an external protocol detail (spec §1); this crate only needs the
/// result to be comparable by before/after (spec §3).
mod helper_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("unrecognized timestamp {raw:?}: {e}"))
    }
}

mod helper_timestamp_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(raw) => super::helper_timestamp::parse(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
