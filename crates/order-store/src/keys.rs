//! Key naming for the primary records and the secondary index.

use crate::model::OrderId;

/// Prefix of every primary record key.
pub const ORDER_KEY_PREFIX: &str = "order:";

/// Name of the set holding every primary key currently stored.
pub const ORDER_INDEX_KEY: &str = "orders";

/// Derives the primary key of an order, e.g. `order:42`.
pub fn order_key(id: OrderId) -> String {
    format!("{}{}", ORDER_KEY_PREFIX, id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_key_is_prefix_plus_decimal_id() {
        assert_eq!(order_key(OrderId(42)), "order:42");
        assert_eq!(order_key(OrderId(0)), "order:0");
        assert_eq!(order_key(OrderId(u64::MAX)), "order:18446744073709551615");
    }
}
