use std::net::SocketAddr;

use crate::engine::AdmissionError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: admission decisions. Labels: outcome.
pub const ADMISSIONS_TOTAL: &str = "roomsync_admissions_total";

/// Histogram: time from candidate to decision, in seconds.
pub const ADMISSION_DURATION_SECONDS: &str = "roomsync_admission_duration_seconds";

/// Counter: cancellation requests, including ones for unknown ids.
pub const CANCELLATIONS_TOTAL: &str = "roomsync_cancellations_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: live bookings held by the store.
pub const BOOKINGS_LIVE: &str = "roomsync_bookings_live";

/// Histogram: log group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomsync_wal_flush_duration_seconds";

/// Histogram: log group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomsync_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for the `outcome` of an admission.
pub fn outcome_label(result: &Result<(), &AdmissionError>) -> &'static str {
    match result {
        Ok(()) => "admitted",
        Err(AdmissionError::MissingField(_)) => "missing_field",
        Err(AdmissionError::InvalidField { .. } | AdmissionError::InvalidWindow { .. }) => {
            "invalid"
        }
        Err(AdmissionError::Clash(_)) => "clash",
        Err(AdmissionError::StorageFailure(_)) => "storage_failure",
    }
}
