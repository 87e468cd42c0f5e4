/*!
 * Tracing
 * Structured logging setup and per-exchange spans using the tracing crate
 */

use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Enables JSON output when set to `1` or `true`
pub const ENV_TRACE_JSON: &str = "COWPIPE_TRACE_JSON";

/// Exchanges slower than this are reported at warn level
const SLOW_EXCHANGE_MS: u128 = 1000;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - COWPIPE_TRACE_JSON: Enable JSON output (default: false)
///
/// Output goes to stderr so it never mixes with the exchanged bytes.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .compact(),
            )
            .init();
        debug!("Structured tracing initialized");
    }
}

/// Generate a unique trace ID for correlating one exchange's events
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one parent/child exchange
pub struct ExchangeSpan {
    span: tracing::Span,
    start: Instant,
    trace_id: String,
}

impl ExchangeSpan {
    pub fn new(command: &str) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "exchange",
            trace_id = %trace_id,
            command = command,
            bytes_in = tracing::field::Empty,
            bytes_out = tracing::field::Empty,
            exit = tracing::field::Empty,
            error = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn record_bytes_in(&self, count: usize) {
        self.span.record("bytes_in", count);
    }

    pub fn record_bytes_out(&self, count: usize) {
        self.span.record("bytes_out", count);
    }

    pub fn record_exit<V: std::fmt::Debug>(&self, exit: V) {
        self.span.record("exit", format!("{:?}", exit).as_str());
    }

    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for ExchangeSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", duration.as_micros() as u64);
        let _entered = self.span.enter();

        if duration.as_millis() > SLOW_EXCHANGE_MS {
            warn!(
                trace_id = %self.trace_id,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow exchange detected"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                duration_us = duration.as_micros() as u64,
                "exchange completed"
            );
        }
    }
}

/// Helper to create an exchange span
#[inline]
pub fn span_exchange(command: &str) -> ExchangeSpan {
    ExchangeSpan::new(command)
}
