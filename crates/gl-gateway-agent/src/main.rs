//! GridLink Gateway Agent: provisioning + SCADA telemetry for edge
//! gateways.
//!
//! On boot the agent provisions itself against the fleet provisioning
//! service if it has no long-lived credentials yet, then reports SCADA
//! telemetry over HTTPS or MQTT until shut down.

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use gl_gateway_agent::config::GatewayConfig;
use gl_gateway_agent::hub::GatewayHub;
use gl_gateway_agent::telemetry_loop;
use gl_scada_reporter::{ReporterProtocol, ScadaReporter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "gl-gateway-agent starting"
    );

    // ── Load config ─────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/gridlink/gateway.toml".to_string());

    let config = GatewayConfig::from_file(&config_path)?;
    tracing::info!(
        gateway_id = %config.gateway_id,
        endpoint = %config.provisioning.endpoint,
        "config loaded"
    );

    // ── Credentials ─────────────────────────────────────────────
    let hub = GatewayHub::new(&config.gateway_id, config.provisioning.clone());
    let newly_provisioned = match hub.ensure_provisioned().await? {
        Some(receipt) => {
            tracing::info!(
                thing_name = receipt.thing_name.as_deref().unwrap_or("unknown"),
                "gateway provisioned"
            );
            true
        }
        None => {
            tracing::info!("gateway already provisioned");
            false
        }
    };

    // ── Telemetry ───────────────────────────────────────────────
    let Some(telemetry) = config.telemetry else {
        tracing::info!("telemetry not configured, nothing left to do");
        return Ok(());
    };

    let reporter = match telemetry.protocol {
        ReporterProtocol::Https => ScadaReporter::new(telemetry.clone())?,
        ReporterProtocol::Mqtts => {
            let session = hub.connect().await?;
            ScadaReporter::with_session(telemetry.clone(), session)?
        }
    };

    // A freshly provisioned gateway announces itself once. Registration
    // only exists on the HTTPS side.
    if newly_provisioned {
        if telemetry.protocol == ReporterProtocol::Https {
            let data = reporter.new_gateway_data(&config.gateway_id);
            match reporter.register(&data).await {
                Ok(()) => tracing::info!("gateway registered with the SCADA cloud"),
                Err(e) => tracing::warn!(error = %e, "gateway registration failed"),
            }
        } else {
            tracing::debug!("registration skipped, requires the HTTPS protocol");
        }
    }

    tracing::info!(
        interval_secs = config.report_interval_secs,
        "gl-gateway-agent ready"
    );

    tokio::select! {
        // Publish periodic telemetry reports
        () = telemetry_loop::run(
            &reporter,
            &config.gateway_id,
            Duration::from_secs(config.report_interval_secs),
        ) => {
            tracing::error!("telemetry loop exited unexpectedly");
        }
        // Graceful shutdown on SIGINT/SIGTERM
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("gl-gateway-agent stopped");
    Ok(())
}
