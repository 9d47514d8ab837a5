//! Gateway configuration (spec §6 `create(options)`).

use std::time::Duration;

/// Options accepted by [`crate::Gateway::create`], with the defaults and
/// effects documented in spec §6.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct GatewayOptions {
    /// Poll cadence, in seconds. Converted to milliseconds internally.
    pub interval_secs: u64,
    pub transmit_batch_size: usize,
    pub delete_batch_size: usize,
    /// 0 means unlimited.
    pub max_transmit_attempts: u32,
    pub debug: bool,
    /// If set, `<prefix>/bin` is prepended to the helper's `PATH`.
    pub prefix: Option<String>,
    /// Name (or path) of the helper binary. Not part of spec §6's option
    /// table — the spec assumes a fixed `gammu-json` on `PATH` — but exposed
    /// here so the demo binary and tests can point at a stand-in helper.
    pub helper_program: String,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        GatewayOptions {
            interval_secs: 5,
            transmit_batch_size: 64,
            delete_batch_size: 1024,
            max_transmit_attempts: 2,
            debug: false,
            prefix: None,
            helper_program: "gammu-json".to_string(),
        }
    }
}

impl GatewayOptions {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
