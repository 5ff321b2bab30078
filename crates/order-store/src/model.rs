//! # Order Entity
//!
//! Pure data structures for the order record. Nothing in here talks to a backend;
//! the [`OrderStore`](crate::OrderStore) owns encoding and persistence.
//!
//! The canonical byte form of an [`Order`] is its JSON document:
//!
//! ```json
//! {
//!   "order_id": 42,
//!   "customer_id": 5,
//!   "line_items": [{ "item_id": 9, "quantity": 2 }],
//!   "created_at": "2024-03-01T12:00:00Z",
//!   "shipped_at": null,
//!   "completed_at": null
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Type-safe identifier for Orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe identifier for the customer who placed an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub u64);

impl From<u64> for CustomerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe identifier for a catalog item referenced by a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// One entry of an order: which item, and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// Represents a customer order.
///
/// The timestamps track progress through fulfillment: every order has a
/// `created_at`, and `shipped_at` / `completed_at` are filled in as it moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates a new, not yet shipped Order.
    ///
    /// # Arguments
    /// * `order_id` - Unique identifier, also the source of the storage key
    /// * `customer_id` - ID of the customer placing the order
    /// * `line_items` - Ordered items and quantities
    /// * `created_at` - Creation timestamp
    pub fn new(
        order_id: OrderId,
        customer_id: CustomerId,
        line_items: Vec<LineItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            customer_id,
            line_items,
            created_at,
            shipped_at: None,
            completed_at: None,
        }
    }
}
