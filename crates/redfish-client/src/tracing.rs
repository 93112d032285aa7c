//! # Observability & Tracing
//!
//! Structured logging for the whole client, built on the `tracing` crate.
//!
//! The library itself only emits events: dispatch decisions and fetches at
//! `debug`, monitor progress at `info`, stalls, faults and skipped members
//! at `warn`. Applications call [`setup_tracing`] once at startup to
//! install a subscriber; the log level is selected through the `RUST_LOG`
//! environment variable.
//!
//! ```bash
//! # Monitor progress only
//! RUST_LOG=info cargo run
//!
//! # Show every dispatch decision and request
//! RUST_LOG=debug cargo run
//!
//! # Filter to the monitor module
//! RUST_LOG=redfish_client::monitor=debug cargo run
//! ```

/// Installs the process-wide subscriber. Call once at startup.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
