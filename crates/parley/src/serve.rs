// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Opens storage, builds the engine, and serves the HTTP gateway until a
//! shutdown signal arrives. Abandoned calls are swept in the background.

use std::sync::Arc;
use std::time::Duration;

use parley_agent::install_signal_handler;
use parley_config::model::ParleyConfig;
use parley_core::{ParleyError, PluginAdapter};
use parley_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig, start_server};
use parley_prometheus::PrometheusAdapter;
use tracing::{error, info, warn};

use crate::wiring::build_engine;

/// Grace period for in-flight turns and webhook tasks after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.agent.log_level);

    info!(persona = %config.agent.name, "starting parley");

    let prometheus = match PrometheusAdapter::new() {
        Ok(adapter) => Some(adapter),
        Err(e) => {
            warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            None
        }
    };
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        prometheus.as_ref().map(|adapter| {
            let handle = adapter.handle().clone();
            Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });

    let (engine, storage) = build_engine(&config).await?;

    let cancel = install_signal_handler();

    let sweeper = tokio::spawn(engine.clone().run_sweeper(cancel.clone()));

    let state = GatewayState {
        engine: engine.clone(),
        auth: AuthConfig {
            bearer_token: config.gateway.bearer_token.clone(),
            webhook_secret: config.gateway.webhook_secret.clone(),
        },
        health: HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render,
        },
    };
    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };

    let served = start_server(&server_config, state, cancel.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "gateway stopped with an error");
    }

    // Stop the sweeper even when the server failed to bind.
    cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "call sweeper task panicked");
    }

    engine.drain(DRAIN_TIMEOUT).await;

    if let Err(e) = storage.shutdown().await {
        warn!(error = %e, "storage shutdown failed");
    }

    info!("parley stopped");
    served
}

/// Initialize the tracing subscriber with the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
