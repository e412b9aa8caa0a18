//! Per-worker tick counters and a queue-depth gauge, registered against
//! the global prometheus registry and served as plain text on a raw
//! TCP listener — there is no HTTP framework in this workspace, so
//! `serve_metrics` speaks just enough HTTP/1.1 to answer a scrape.

use std::convert::Infallible;

use once_cell::sync::OnceCell;
use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, TextEncoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::warn;

static METRICS: OnceCell<Metrics> = OnceCell::new();

struct Metrics {
    ticks_total: IntCounterVec,
    tick_errors_total: IntCounterVec,
    rows_processed_total: IntCounterVec,
    queue_depth: GaugeVec,
}

/// Registers this process's counters and gauge against the default
/// registry under `namespace`. Idempotent; only the first call's
/// namespace takes effect. `record_*`/`render` are no-ops before this
/// runs, so a service with `metrics_enabled = false` can skip calling
/// it entirely and the rest of the worker code stays unchanged.
pub fn init_metrics(namespace: &str) {
    METRICS.get_or_init(|| {
        let ticks_total = IntCounterVec::new(
            Opts::new("ticks_total", "completed poll-loop ticks").namespace(namespace),
            &["service"],
        )
        .expect("static ticks_total metric opts are valid");
        let tick_errors_total = IntCounterVec::new(
            Opts::new("tick_errors_total", "poll-loop ticks that returned an error").namespace(namespace),
            &["service"],
        )
        .expect("static tick_errors_total metric opts are valid");
        let rows_processed_total = IntCounterVec::new(
            Opts::new("rows_processed_total", "rows or messages processed in a tick").namespace(namespace),
            &["service"],
        )
        .expect("static rows_processed_total metric opts are valid");
        let queue_depth = GaugeVec::new(
            Opts::new("queue_depth", "rows fetched as due in the most recent tick").namespace(namespace),
            &["service"],
        )
        .expect("static queue_depth metric opts are valid");

        for collector in [
            Box::new(ticks_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(tick_errors_total.clone()),
            Box::new(rows_processed_total.clone()),
            Box::new(queue_depth.clone()),
        ] {
            if let Err(err) = prometheus::register(collector) {
                warn!(error = %err, "failed to register metric collector");
            }
        }

        Metrics { ticks_total, tick_errors_total, rows_processed_total, queue_depth }
    });
}

pub fn record_tick(service: &str) {
    if let Some(m) = METRICS.get() {
        m.ticks_total.with_label_values(&[service]).inc();
    }
}

pub fn record_tick_error(service: &str) {
    if let Some(m) = METRICS.get() {
        m.tick_errors_total.with_label_values(&[service]).inc();
    }
}

pub fn record_rows_processed(service: &str, count: i64) {
    if let Some(m) = METRICS.get() {
        m.rows_processed_total.with_label_values(&[service]).inc_by(count.max(0) as u64);
    }
}

pub fn record_queue_depth(service: &str, depth: i64) {
    if let Some(m) = METRICS.get() {
        m.queue_depth.with_label_values(&[service]).set(depth as f64);
    }
}

/// Renders every registered metric family in prometheus text exposition
/// format. Empty (not an error) before [`init_metrics`] has run.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Serves `render()`'s output on every connection to `port`, ignoring
/// the request path and method. Runs until the listener itself errors;
/// callers `tokio::spawn` this alongside the service's poll loop.
pub async fn serve_metrics(port: u16) -> Result<Infallible, std::io::Error> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    loop {
        let (mut socket, _) = listener.accept().await?;
        tokio::spawn(async move {
            let mut discard = [0u8; 1024];
            // Best-effort: drain whatever the client sent so far. A
            // scrape request with a body larger than this would still
            // get a valid response, just after the client sees a
            // connection reset on its write side - acceptable for a
            // metrics endpoint with no such clients in practice.
            let _ = socket.read(&mut discard).await;

            let body = render();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            if let Err(err) = socket.write_all(response.as_bytes()).await {
                warn!(error = %err, "failed to write metrics response");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_empty_string_before_init() {
        // init_metrics is process-global and other tests in this binary
        // may have already called it; just assert render() never panics
        // and always returns valid UTF-8 text either way.
        let _ = render();
    }

    #[test]
    fn record_calls_are_harmless_before_init_in_isolation() {
        record_tick("test-service-never-initialized");
        record_tick_error("test-service-never-initialized");
        record_rows_processed("test-service-never-initialized", 5);
        record_queue_depth("test-service-never-initialized", 3);
    }
}
