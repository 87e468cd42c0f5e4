/*!
 * Monitoring
 * Structured logging setup and exchange tracing
 */

mod tracer;

pub use tracer::{generate_trace_id, init_tracing, span_exchange, ExchangeSpan, ENV_TRACE_JSON};
