//! Subprocess Runner (spec §4.1).
//!
//! Spawns `gammu-json` with a given argument vector, collects its complete
//! stdout, and parses it as JSON. Standard input is closed immediately; the
//! helper never reads it. Standard error is captured only for diagnostic
//! logging, never folded into the result.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::instrument;

use crate::error::GatewayError;

/// Abstracts "run the helper with these args and get back JSON" so the
/// pipelines can be tested against a fake without spawning a real process
/// (spec §4.11).
#[async_trait]
pub trait SubprocessRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<Value, GatewayError>;
}

/// Runs `gammu-json` as a real child process via `tokio::process::Command`.
#[derive(Debug, Clone)]
pub struct TokioSubprocessRunner {
    program: String,
    path_override: Option<String>,
    debug_enabled: bool,
}

impl TokioSubprocessRunner {
    /// `prefix`, if set, causes the helper to be spawned with
    /// `<prefix>/bin` prepended to `PATH` (spec §6 `create` option).
    pub fn new(program: impl Into<String>, prefix: Option<&str>, debug_enabled: bool) -> Self {
        let path_override = prefix.map(|p| {
            let inherited = std::env::var("PATH").unwrap_or_default();
            format!("{p}/bin:{inherited}")
        });

        TokioSubprocessRunner {
            program: program.into(),
            path_override,
            debug_enabled,
        }
    }
}

#[async_trait]
impl SubprocessRunner for TokioSubprocessRunner {
    #[instrument(
        name = "gammu_gateway_core::subprocess::run",
        target = "subprocess",
        skip_all,
        level = "debug"
    )]
    async fn run(&self, args: &[String]) -> Result<Value, GatewayError> {
        tracing::debug!(program = %self.program, args = ?args, "spawning helper");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(path) = &self.path_override {
            cmd.env("PATH", path);
        }

        let output = cmd.output().await.map_err(|e| {
            tracing::error!(error = %e, program = %self.program, "failed to spawn helper");
            GatewayError::SubprocessExit { code: -1 }
        })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(code, stderr = %stderr, "helper exited non-zero");
            return Err(GatewayError::SubprocessExit { code });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if self.debug_enabled {
            tracing::trace!(args = ?args, stdout = %stdout, "helper output");
        }

        serde_json::from_str(&stdout).map_err(|e| {
            tracing::error!(error = %e, "failed to parse helper stdout as JSON");
            GatewayError::SubprocessParse {
                cause: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
pub mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays a fixed sequence of canned JSON responses, one per call,
    /// regardless of the arguments passed. Used in place of a real
    /// `gammu-json` child process in pipeline tests (spec §4.11).
    pub struct FakeRunner {
        responses: Mutex<VecDeque<Result<Value, GatewayError>>>,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeRunner {
        pub fn new(responses: Vec<Result<Value, GatewayError>>) -> Self {
            FakeRunner {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SubprocessRunner for FakeRunner {
        async fn run(&self, args: &[String]) -> Result<Value, GatewayError> {
            self.calls.lock().unwrap().push(args.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Value::Array(Vec::new())))
        }
    }
}
