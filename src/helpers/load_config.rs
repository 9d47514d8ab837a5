//! Demo convenience: load a [`gammu_gateway_core::GatewayOptions`]-shaped
//! section from a TOML file. Not part of the library's own initiative — the
//! core never reads files on its own beyond what the `prefix` option causes
//! at the Subprocess Runner boundary.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gammu_gateway_core::GatewayOptions;
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    gateway: GatewayOptions,
}

/// Load `GatewayOptions` from a `[gateway]` table in `path`, or the defaults
/// if the file has no such table.
pub fn load<P: AsRef<Path>>(path: P) -> Result<GatewayOptions> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    let parsed: ConfigFile = toml::from_str(&raw)
        .with_context(|| format!("parsing configuration file {}", path.display()))?;
    Ok(parsed.gateway)
}
