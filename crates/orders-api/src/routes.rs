use crate::handlers::{self, AppState};
use axum::routing::{get, post};
use axum::Router;

/// Builds the service router.
///
/// | Method | Path | Handler |
/// |--------|------|---------|
/// | `POST` | `/orders` | [`handlers::create_order`] |
/// | `GET` | `/orders` | [`handlers::list_orders`] |
/// | `GET` | `/orders/{id}` | [`handlers::get_order`] |
/// | `PUT` | `/orders/{id}` | [`handlers::update_order`] |
/// | `DELETE` | `/orders/{id}` | [`handlers::delete_order`] |
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/orders",
            post(handlers::create_order).get(handlers::list_orders),
        )
        .route(
            "/orders/{id}",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .with_state(state)
}
