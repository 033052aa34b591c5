//! Periodic telemetry publisher.
//!
//! Assembles a gateway report at a configurable interval and sends it via
//! the reporter. Delivery failures are logged and the loop keeps going;
//! the next interval gets a fresh report.

use std::time::Duration;

use tokio::time;

use gl_scada_reporter::{GatewayData, ReportResult, ScadaReporter};

/// Run the telemetry loop, reporting at `interval`.
///
/// This function runs forever until the task is cancelled. Intended to
/// be driven from the agent's top-level select.
pub async fn run(reporter: &ScadaReporter, gateway_id: &str, interval: Duration) {
    let mut ticker = time::interval(interval);
    // Skip the first tick (fires immediately).
    ticker.tick().await;

    let start_time = tokio::time::Instant::now();
    let mut sequence: u64 = 0;

    loop {
        ticker.tick().await;
        sequence += 1;

        match build_report(reporter, gateway_id, start_time, sequence) {
            Ok(data) => {
                if let Err(e) = reporter.send(&data).await {
                    tracing::warn!(error = %e, sequence, "failed to send telemetry report");
                } else {
                    tracing::debug!(sequence, "telemetry report sent");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to assemble telemetry report"),
        }
    }
}

/// Built-in gateway health sources: uptime and report sequence.
fn build_report(
    reporter: &ScadaReporter,
    gateway_id: &str,
    start_time: tokio::time::Instant,
    sequence: u64,
) -> ReportResult<GatewayData> {
    let mut data = reporter.new_gateway_data(gateway_id);
    data.data_source("gateway-uptime")?
        .set_value(start_time.elapsed().as_secs() as f64);
    data.data_source("report-sequence")?
        .set_value(sequence as f64);
    Ok(data)
}
