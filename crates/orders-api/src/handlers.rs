//! HTTP handlers for the `/orders` resource.
//!
//! Handlers translate requests into [`OrderStore`] calls and store errors into
//! [`ApiError`] responses. They hold no state of their own.

use crate::error::ApiError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use order_store::{CustomerId, LineItem, Order, OrderId, OrderStore, Page};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use tracing::{debug, info};

/// Upper bound for the `size` query parameter of a listing request.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: OrderStore,
    /// Page size used when a listing request does not name one.
    pub page_size: NonZeroUsize,
}

impl AppState {
    pub fn new(store: OrderStore, page_size: NonZeroUsize) -> Self {
        Self { store, page_size }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub customer_id: CustomerId,
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub cursor: u64,
    pub size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub items: Vec<Order>,
    /// Cursor for the next request; absent once the listing is complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
}

/// Lifecycle states a client may move an order into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Shipped,
    Completed,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrder {
    pub status: Status,
}

/// `POST /orders`
pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = Order::new(
        OrderId(rand::random()),
        body.customer_id,
        body.line_items,
        Utc::now(),
    );
    state.store.insert(&order).await?;

    info!(order_id = %order.order_id, customer_id = %order.customer_id, "Order created");
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /orders?cursor=&size=`
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrderList>, ApiError> {
    let size = query
        .size
        .unwrap_or(state.page_size.get())
        .clamp(1, MAX_PAGE_SIZE);
    let size = NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN);

    let result = state.store.find_all(Page::resume(size, query.cursor)).await?;
    let next = (!result.is_last()).then_some(result.cursor);
    debug!(cursor = query.cursor, count = result.orders.len(), ?next, "Orders listed");
    Ok(Json(OrderList {
        items: result.orders,
        next,
    }))
}

/// `GET /orders/{id}`
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Order>, ApiError> {
    let order = state.store.find_by_id(OrderId(id)).await?;
    Ok(Json(order))
}

/// `PUT /orders/{id}`
///
/// Read-modify-write: a concurrent update to the same order may be overwritten.
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<UpdateOrder>,
) -> Result<Json<Order>, ApiError> {
    let mut order = state.store.find_by_id(OrderId(id)).await?;
    apply_status(&mut order, body.status, Utc::now())?;
    state.store.update(&order).await?;

    info!(order_id = %order.order_id, status = ?body.status, "Order updated");
    Ok(Json(order))
}

/// `DELETE /orders/{id}`
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_by_id(OrderId(id)).await?;

    info!(order_id = id, "Order deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Moves `order` into `status`. Orders ship once and complete once, after shipping.
fn apply_status(order: &mut Order, status: Status, now: DateTime<Utc>) -> Result<(), ApiError> {
    match status {
        Status::Shipped => {
            if order.shipped_at.is_some() {
                return Err(ApiError::InvalidTransition("order already shipped"));
            }
            order.shipped_at = Some(now);
        }
        Status::Completed => {
            if order.completed_at.is_some() {
                return Err(ApiError::InvalidTransition("order already completed"));
            }
            if order.shipped_at.is_none() {
                return Err(ApiError::InvalidTransition("order not shipped yet"));
            }
            order.completed_at = Some(now);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_store::ItemId;

    fn order() -> Order {
        Order::new(
            OrderId(1),
            CustomerId(2),
            vec![LineItem {
                item_id: ItemId(3),
                quantity: 1,
            }],
            Utc::now(),
        )
    }

    #[test]
    fn test_ship_then_complete() {
        let mut order = order();
        let now = Utc::now();

        apply_status(&mut order, Status::Shipped, now).unwrap();
        assert_eq!(order.shipped_at, Some(now));

        apply_status(&mut order, Status::Completed, now).unwrap();
        assert_eq!(order.completed_at, Some(now));
    }

    #[test]
    fn test_complete_requires_shipping() {
        let mut order = order();
        let err = apply_status(&mut order, Status::Completed, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidTransition(_)));
        assert!(order.completed_at.is_none());
    }

    #[test]
    fn test_transitions_happen_once() {
        let mut order = order();
        apply_status(&mut order, Status::Shipped, Utc::now()).unwrap();
        assert!(apply_status(&mut order, Status::Shipped, Utc::now()).is_err());

        apply_status(&mut order, Status::Completed, Utc::now()).unwrap();
        assert!(apply_status(&mut order, Status::Completed, Utc::now()).is_err());
    }

    #[test]
    fn test_status_names() {
        let body: UpdateOrder = serde_json::from_str(r#"{"status":"shipped"}"#).unwrap();
        assert_eq!(body.status, Status::Shipped);
        assert!(serde_json::from_str::<UpdateOrder>(r#"{"status":"lost"}"#).is_err());
    }
}
