//! Structured logging configuration.
//!
//! `tracing` carries the server's own events; the library crate logs through
//! `log`, which the subscriber picks up through its log bridge.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Levels come from `RUST_LOG`, defaulting to `info,sqlx=warn,hyper=warn`.
///
/// # Example
///
/// ```no_run
/// use tp_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `subject_id` - Admin or participant ID, when known
/// * `ip_address` - Client address, when known
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use tp_server::logging::log_security_event;
///
/// log_security_event(
///     "failed_login",
///     None,
///     Some("192.168.1.1"),
///     "Invalid password attempt"
/// );
/// ```
pub fn log_security_event(
    event_type: &str,
    subject_id: Option<i64>,
    ip_address: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        subject_id = subject_id,
        ip_address = ip_address,
        "SECURITY: {}",
        message
    );
}

/// Log API request/response
///
/// Requests slower than a second are logged at `warn`.
pub fn log_api_request(method: &str, path: &str, status_code: u16, duration_ms: u64) {
    if duration_ms > 1000 {
        tracing::warn!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "Slow API request"
        );
    } else {
        tracing::info!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request completed"
        );
    }
}
