//! # Process Lifecycle
//!
//! Startup, serving and shutdown of the orders service.
//!
//! ## Startup
//!
//! [`App::new`] builds the backend named in the [`Config`](crate::config::Config):
//! a pooled Redis client or an in-process store. [`App::start`] pings it before
//! binding, so a service that cannot reach its storage never accepts traffic.
//!
//! ## Shutdown
//!
//! When the shutdown future passed to [`App::start`] completes:
//!
//! 1. The listener stops accepting connections
//! 2. In-flight requests are given `shutdown_timeout` to finish
//! 3. Anything still running after that is aborted
//! 4. The backend handle is closed
//!
//! ## Observability
//!
//! See [`setup_tracing`] for log configuration.

pub mod app;
pub mod tracing;

pub use self::app::*;
pub use self::tracing::*;
