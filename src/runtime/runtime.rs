//! Demo runtime: wires a [`gammu_gateway_core::Gateway`] up with simple
//! stdout-logging handlers, starts polling, and runs until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use gammu_gateway_core::{
    ErrorHandler, Gateway, GatewayError, GatewayOptions, Handler, Message, ReceiveHandler,
    TransmitHandler,
};
use tokio::signal;
use tracing::instrument;

use crate::helpers::load_config;

struct LoggingReceiveHandler;

#[async_trait]
impl ReceiveHandler for LoggingReceiveHandler {
    async fn on_receive(&self, message: &Message) -> Result<(), GatewayError> {
        tracing::info!(from = %message.from, "received message");
        tracing::trace!(content = %message.content, "message body");
        Ok(())
    }
}

struct LoggingTransmitHandler;

#[async_trait]
impl TransmitHandler for LoggingTransmitHandler {
    async fn on_transmit(&self, to: &str, _content: &str, result: &str) {
        tracing::info!(to, result, "transmit completed");
    }
}

struct LoggingErrorHandler;

#[async_trait]
impl ErrorHandler for LoggingErrorHandler {
    async fn on_error(&self, error: &GatewayError, message: Option<&Message>) {
        tracing::error!(scope = ?error.scope(), error = %error, has_message = message.is_some(), "gateway error event");
    }
}

#[instrument(name = "demo_runtime::run_gateway", skip_all, level = "info")]
pub async fn run_gateway(config_path: Option<PathBuf>) -> Result<()> {
    let options = match config_path {
        Some(path) => {
            tracing::info!(config = %path.display(), "loading configuration file");
            load_config::load(&path)?
        }
        None => GatewayOptions::default(),
    };

    let gateway = Arc::new(Gateway::create(options));

    gateway
        .on("receive", Handler::Receive(Arc::new(LoggingReceiveHandler)))
        .await?;
    gateway
        .on("transmit", Handler::Transmit(Arc::new(LoggingTransmitHandler)))
        .await?;
    gateway
        .on("error", Handler::Error(Arc::new(LoggingErrorHandler)))
        .await?;

    tracing::info!("starting gateway poll scheduler");
    gateway.start().await;

    signal::ctrl_c().await.expect("failed to listen for Ctrl+C");
    tracing::info!("Ctrl+C received, stopping gateway");

    gateway.stop().await;
    tracing::info!("gateway stopped cleanly");

    Ok(())
}
