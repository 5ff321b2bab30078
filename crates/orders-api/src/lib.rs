//! # Orders API
//!
//! HTTP front end of the order store: create, fetch, list, ship, complete and
//! delete orders over JSON.
//!
//! - **[config]**: settings read from the environment.
//! - **[handlers]**: one async handler per route, plus the order status rules.
//! - **[routes]**: the axum [`Router`](axum::Router).
//! - **[error]**: mapping of store failures to HTTP responses.
//! - **[lifecycle]**: the [`App`](lifecycle::App) host and logging setup.
//!
//! ## 🧪 Testing
//!
//! The router runs against a [`MemoryBackend`](order_store::MemoryBackend) in tests, with
//! requests sent through `tower::ServiceExt::oneshot`. No socket is needed.

pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod routes;
