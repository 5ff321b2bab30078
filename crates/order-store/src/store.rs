//! # Order Store
//!
//! CRUD and paginated listing of [`Order`] records on top of a [`Backend`].
//!
//! ## Storage layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `order:{id}` | JSON document of the order (the primary record) |
//! | `orders` | set of every primary key currently stored (the index) |
//!
//! A primary key exists if and only if it is a member of `orders`. Insert and delete
//! touch both, so they always run as one [`Transaction`]; update only rewrites the
//! primary record and leaves the index alone.
//!
//! ## Failure handling
//!
//! The store never retries and never swallows an error. Backend faults come back as
//! [`StoreError::BackendUnavailable`] straight away, and a transaction that did not
//! commit has no effect.
//!
//! ## Listing
//!
//! [`OrderStore::find_all`] performs one scan step over the index. Chaining the
//! returned cursor until it is `0` visits every order of an unchanging data set
//! exactly once. The scan is not a snapshot: orders inserted or deleted during an
//! iteration may be seen zero, one or several times.

use crate::backend::{Backend, Command, Condition, Outcome, Transaction};
use crate::error::StoreError;
use crate::keys::{order_key, ORDER_INDEX_KEY};
use crate::model::{Order, OrderId};
use crate::pages::OrderPages;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Position and size of one listing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub size: NonZeroUsize,
    /// Opaque continuation token; `0` starts a new scan.
    pub cursor: u64,
}

impl Page {
    /// The first page of a new scan.
    pub fn first(size: NonZeroUsize) -> Self {
        Self { size, cursor: 0 }
    }

    /// Continues a scan from a cursor returned by an earlier step.
    pub fn resume(size: NonZeroUsize, cursor: u64) -> Self {
        Self { size, cursor }
    }
}

/// One page of orders and the cursor to continue from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindResult {
    pub orders: Vec<Order>,
    /// `0` when the scan is complete.
    pub cursor: u64,
}

impl FindResult {
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// Persistence of orders in a key-value backend.
///
/// Cheap to clone; every clone shares the same injected backend handle.
#[derive(Clone)]
pub struct OrderStore {
    backend: Arc<dyn Backend>,
}

impl OrderStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The backend handle this store was built with.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Checks that the backend is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.backend.ping().await?)
    }

    /// Stores a new order and adds it to the index.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if an order with the same id exists;
    /// nothing is written in that case.
    #[instrument(level = "debug", skip(self, order), fields(order_id = %order.order_id))]
    pub async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let key = order_key(order.order_id);
        let value = encode(&key, order)?;

        let mut tx = Transaction::begin(self.backend.as_ref());
        tx.require(Condition::Absent(key.clone()))
            .queue(Command::Set {
                key: key.clone(),
                value,
            })
            .queue(Command::SetAdd {
                set: ORDER_INDEX_KEY.to_string(),
                member: key.clone(),
            });

        match tx.commit().await? {
            Outcome::Committed => Ok(()),
            Outcome::Rejected(_) => Err(StoreError::DuplicateKey { key }),
        }
    }

    /// Loads one order.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_id(&self, id: OrderId) -> Result<Order, StoreError> {
        let key = order_key(id);
        match self.backend.get(&key).await? {
            Some(bytes) => decode(&key, &bytes),
            None => Err(StoreError::NotFound { key }),
        }
    }

    /// Replaces an existing order. Never creates one.
    #[instrument(level = "debug", skip(self, order), fields(order_id = %order.order_id))]
    pub async fn update(&self, order: &Order) -> Result<(), StoreError> {
        let key = order_key(order.order_id);
        let value = encode(&key, order)?;

        if self.backend.set_existing(&key, &value).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound { key })
        }
    }

    /// Removes an order and its index entry together.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete_by_id(&self, id: OrderId) -> Result<(), StoreError> {
        let key = order_key(id);

        let mut tx = Transaction::begin(self.backend.as_ref());
        tx.require(Condition::Present(key.clone()))
            .queue(Command::Delete { key: key.clone() })
            .queue(Command::SetRemove {
                set: ORDER_INDEX_KEY.to_string(),
                member: key.clone(),
            });

        match tx.commit().await? {
            Outcome::Committed => Ok(()),
            Outcome::Rejected(_) => Err(StoreError::NotFound { key }),
        }
    }

    /// Runs one scan step over the index and loads the orders it returned.
    ///
    /// Returns at most `page.size` orders. An empty page with a non-zero cursor is
    /// normal and means the scan should continue. If any stored record fails to
    /// decode, the whole page fails with [`StoreError::Decoding`].
    ///
    /// Index members without a primary record are left out of the page and not
    /// reported as errors. A delete racing the scan produces them, and so does an
    /// index entry left dangling by a write that bypassed the store; both are only
    /// visible in `debug` logs.
    #[instrument(
        level = "debug",
        skip(self, page),
        fields(size = page.size.get(), cursor = page.cursor)
    )]
    pub async fn find_all(&self, page: Page) -> Result<FindResult, StoreError> {
        let batch = self
            .backend
            .scan_set(ORDER_INDEX_KEY, page.cursor, page.size.get())
            .await?;
        if batch.members.is_empty() {
            return Ok(FindResult {
                orders: Vec::new(),
                cursor: batch.cursor,
            });
        }

        let values = self.backend.get_many(&batch.members).await?;
        let mut orders = Vec::with_capacity(values.len());
        for (key, value) in batch.members.iter().zip(values) {
            let Some(bytes) = value else {
                debug!(key, "Indexed order has no record, skipping");
                continue;
            };
            orders.push(decode(key, &bytes)?);
        }

        Ok(FindResult {
            orders,
            cursor: batch.cursor,
        })
    }

    /// Starts a lazy page-by-page iteration over every order.
    pub fn pages(&self, size: NonZeroUsize) -> OrderPages {
        OrderPages::new(self.clone(), Page::first(size))
    }

    /// Continues a page-by-page iteration from an earlier cursor.
    pub fn resume_pages(&self, page: Page) -> OrderPages {
        OrderPages::new(self.clone(), page)
    }
}

fn encode(key: &str, order: &Order) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(order).map_err(|source| StoreError::Encoding {
        key: key.to_string(),
        source,
    })
}

fn decode(key: &str, bytes: &[u8]) -> Result<Order, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Decoding {
        key: key.to_string(),
        source,
    })
}
