//! # Logging
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter filtered by
//! `RUST_LOG`, falling back to `info` when the variable is unset or invalid.
//!
//! ```bash
//! RUST_LOG=info cargo run -p orders-api             # lifecycle and per-request events
//! RUST_LOG=order_store=debug,info cargo run -p orders-api   # plus store operation spans
//! ```
//!
//! Store operations open `debug` spans carrying the order id, so events logged inside a
//! request show up with their span inline:
//!
//! ```text
//! INFO Order created order_id=1780 customer_id=5
//! ERROR Request failed code=backend_unavailable error=order backend unavailable: ...
//! ```

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. Call once, at process start.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
