//! Logging setup shared by binaries and examples.

use tracing_subscriber::EnvFilter;

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Call once at startup. Operations log inside a `perform` span carrying the operation name
/// and calling domain, so `RUST_LOG=domain_framework=debug` shows params and validation
/// verdicts for every request.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
