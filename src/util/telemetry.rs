//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing for the node. Embedders can install their own
/// subscriber; this helper installs an env-filtered fmt subscriber only if
/// none is set yet (`RUST_LOG=sp_scheduler=debug`).
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}
