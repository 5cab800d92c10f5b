//! Tracing and metrics initialization (ambient "Logging"/"Observability"
//! concerns, carried regardless of the distilled spec's Non-goals on
//! metrics surfaces).
//!
//! Grounded on the teacher's `tracing_subscriber::fmt()` + `EnvFilter`
//! setup pattern; the OTLP exporter chain the teacher also carries is
//! dropped (see DESIGN.md) in favor of the plain `tracing-subscriber`
//! layer, since nothing else in this transformed repo needs a distributed
//! trace collector.

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a `tracing` subscriber filtered by `log_filter` (an `EnvFilter`
/// directive string, e.g. `"info,catalogd_storage=debug"`).
pub fn init_tracing(log_filter: &str) {
    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();
}

/// Starts a Prometheus exporter listening on `metrics_address`, exposing
/// every `metrics::counter!`/`histogram!` call site in the process
/// (spec.md's ambient observability concern).
pub fn init_metrics(metrics_address: &str) -> anyhow::Result<()> {
    let addr: std::net::SocketAddr = metrics_address
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics_address {metrics_address}: {e}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install prometheus exporter: {e}"))?;
    Ok(())
}
