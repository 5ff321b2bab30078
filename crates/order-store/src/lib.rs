//! # Order Store
//!
//! > **Order records in a key-value store, with an index that never drifts.**
//!
//! This crate is the persistence core of the orders service. It stores each order as
//! one JSON document and keeps a secondary index set of every stored key, which is
//! what listing walks through.
//!
//! ## 🏗️ Design
//!
//! ### One invariant
//!
//! A primary key exists **if and only if** it is a member of the index set. Insert and
//! delete change both, so they go through a [`Transaction`](backend::Transaction):
//! conditions and commands are queued locally and applied by the backend as one atomic
//! unit on [`commit`](backend::Transaction::commit). A transaction that is dropped
//! before commit (error, early return, cancelled future) applies nothing.
//!
//! ### Typed failures
//!
//! Every operation returns [`StoreError`], and [`StoreError::kind`] maps it to an
//! [`ErrorKind`] a caller can branch on. The store never retries; that is the
//! caller's policy to choose.
//!
//! ### Injected backend
//!
//! [`OrderStore`] holds an `Arc<dyn Backend>` handed in by whoever owns the
//! connection pool. Clones share it.
//!
//! ## 🗺️ Module Tour
//!
//! - [`model`]: the [`Order`] entity and its id newtypes.
//! - [`keys`]: key naming (`order:{id}`, `orders`).
//! - [`store`]: [`OrderStore`] with insert, find, update, delete and paged listing.
//! - [`pages`]: [`OrderPages`], a lazy resumable page sequence.
//! - [`backend`]: the [`Backend`](backend::Backend) seam, transactions, and the
//!   [`RedisBackend`] and [`MemoryBackend`] implementations.
//! - [`error`]: [`StoreError`], [`ErrorKind`], [`BackendError`].
//!
//! ## 🚀 Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use order_store::{
//!     CustomerId, ErrorKind, ItemId, LineItem, MemoryBackend, Order, OrderId, OrderStore,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), order_store::StoreError> {
//! let store = OrderStore::new(Arc::new(MemoryBackend::new()));
//!
//! let order = Order::new(
//!     OrderId(1),
//!     CustomerId(5),
//!     vec![LineItem { item_id: ItemId(9), quantity: 2 }],
//!     Utc::now(),
//! );
//! store.insert(&order).await?;
//! assert_eq!(store.find_by_id(OrderId(1)).await?, order);
//!
//! let again = store.insert(&order).await.unwrap_err();
//! assert_eq!(again.kind(), ErrorKind::DuplicateKey);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod keys;
pub mod model;
pub mod pages;
pub mod store;

pub use backend::{Backend, MemoryBackend, RedisBackend, RedisConfig};
pub use error::{BackendError, ErrorKind, StoreError};
pub use model::{CustomerId, ItemId, LineItem, Order, OrderId};
pub use pages::OrderPages;
pub use store::{FindResult, OrderStore, Page};
