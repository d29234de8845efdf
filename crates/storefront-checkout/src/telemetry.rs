//! Tracing subscriber setup for embedding hosts.
//!
//! The services in this crate emit `tracing` events but never install a
//! subscriber themselves; the host binary decides where logs go. This
//! module offers the default wiring so every host does not have to
//! repeat it.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// Honors `RUST_LOG` when set; otherwise defaults to `info` with
/// crate-level debug for the storefront crates and quieted sqlx query
/// logging. Call once at process startup; a second call panics inside
/// `tracing` (subscriber already set), so hosts embedding multiple
/// services should call this exactly once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,storefront=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
