use chrono::{DateTime, TimeZone, Utc};
use futures::TryStreamExt;
use order_store::backend::{Command, Transaction};
use order_store::keys::ORDER_INDEX_KEY;
use order_store::{
    CustomerId, ErrorKind, ItemId, LineItem, MemoryBackend, Order, OrderId, OrderStore, Page,
    StoreError,
};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn order(id: u64) -> Order {
    Order::new(
        OrderId(id),
        CustomerId(100 + id),
        vec![LineItem {
            item_id: ItemId(id * 10),
            quantity: 1,
        }],
        created_at(),
    )
}

fn setup() -> (Arc<MemoryBackend>, OrderStore) {
    let backend = Arc::new(MemoryBackend::new());
    let store = OrderStore::new(backend.clone());
    (backend, store)
}

fn size(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).expect("page size must be positive")
}

/// Follows cursors until the scan is exhausted and returns every id seen, in order.
async fn scan_all(store: &OrderStore, page_size: usize) -> Vec<u64> {
    let mut seen = Vec::new();
    let mut page = Page::first(size(page_size));
    loop {
        let result = store.find_all(page).await.expect("Failed to list orders");
        assert!(result.orders.len() <= page_size);
        seen.extend(result.orders.iter().map(|o| o.order_id.0));
        if result.is_last() {
            return seen;
        }
        page = Page::resume(size(page_size), result.cursor);
    }
}

async fn index_only(backend: &MemoryBackend, key: &str) {
    let mut tx = Transaction::begin(backend);
    tx.queue(Command::SetAdd {
        set: ORDER_INDEX_KEY.to_string(),
        member: key.to_string(),
    });
    tx.commit().await.expect("Failed to seed index");
}

#[tokio::test]
async fn test_insert_find_delete_lifecycle() {
    let (_backend, store) = setup();
    let placed = Order::new(
        OrderId(1),
        CustomerId(5),
        vec![LineItem {
            item_id: ItemId(9),
            quantity: 2,
        }],
        created_at(),
    );

    store.insert(&placed).await.expect("Failed to insert order");
    let found = store
        .find_by_id(OrderId(1))
        .await
        .expect("Failed to find order");
    assert_eq!(found, placed);

    store
        .delete_by_id(OrderId(1))
        .await
        .expect("Failed to delete order");
    let err = store.find_by_id(OrderId(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_insert_writes_primary_and_index() {
    let (backend, store) = setup();
    store.insert(&order(7)).await.unwrap();

    assert!(backend.contains_key("order:7"));
    assert_eq!(backend.set_members(ORDER_INDEX_KEY), vec!["order:7"]);
}

#[tokio::test]
async fn test_duplicate_insert_leaves_state_unchanged() {
    let (backend, store) = setup();
    let original = order(1);
    store.insert(&original).await.unwrap();

    let mut rival = order(1);
    rival.customer_id = CustomerId(999);
    let err = store.insert(&rival).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateKey);
    assert!(matches!(err, StoreError::DuplicateKey { ref key } if key == "order:1"));
    assert_eq!(store.find_by_id(OrderId(1)).await.unwrap(), original);
    assert_eq!(backend.set_members(ORDER_INDEX_KEY), vec!["order:1"]);
}

#[tokio::test]
async fn test_delete_absent_is_not_found() {
    let (backend, store) = setup();
    store.insert(&order(2)).await.unwrap();

    let err = store.delete_by_id(OrderId(1)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(backend.contains_key("order:2"));
    assert_eq!(backend.set_members(ORDER_INDEX_KEY), vec!["order:2"]);
}

#[tokio::test]
async fn test_delete_removes_primary_and_index_entry() {
    let (backend, store) = setup();
    store.insert(&order(1)).await.unwrap();
    store.insert(&order(2)).await.unwrap();

    store.delete_by_id(OrderId(1)).await.unwrap();

    assert!(!backend.contains_key("order:1"));
    assert_eq!(backend.set_members(ORDER_INDEX_KEY), vec!["order:2"]);
    assert_eq!(scan_all(&store, 10).await, vec![2]);
}

#[tokio::test]
async fn test_update_absent_creates_nothing() {
    let (backend, store) = setup();

    let err = store.update(&order(3)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!backend.contains_key("order:3"));
    assert!(backend.set_members(ORDER_INDEX_KEY).is_empty());
}

#[tokio::test]
async fn test_update_replaces_record_and_keeps_index() {
    let (backend, store) = setup();
    store.insert(&order(4)).await.unwrap();

    let mut shipped = order(4);
    shipped.shipped_at = Some(Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap());
    store.update(&shipped).await.expect("Failed to update order");

    assert_eq!(store.find_by_id(OrderId(4)).await.unwrap(), shipped);
    assert_eq!(backend.set_members(ORDER_INDEX_KEY), vec!["order:4"]);
}

#[tokio::test]
async fn test_corrupted_record_is_decoding_error() {
    let (backend, store) = setup();
    backend.put_raw("order:3", b"{\"order_id\": \"three\"".to_vec());

    let err = store.find_by_id(OrderId(3)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decoding);
    assert!(matches!(err, StoreError::Decoding { ref key, .. } if key == "order:3"));
}

#[tokio::test]
async fn test_find_all_on_empty_store() {
    let (_backend, store) = setup();
    let result = store.find_all(Page::first(size(10))).await.unwrap();
    assert!(result.orders.is_empty());
    assert_eq!(result.cursor, 0);
}

#[tokio::test]
async fn test_find_all_pages_through_five_orders() {
    let (_backend, store) = setup();
    for id in 1..=5 {
        store.insert(&order(id)).await.unwrap();
    }

    let seen = scan_all(&store, 2).await;

    let unique: BTreeSet<u64> = seen.iter().copied().collect();
    assert_eq!(seen.len(), 5, "no order should be returned twice");
    assert_eq!(unique, (1..=5).collect::<BTreeSet<u64>>());
}

#[tokio::test]
async fn test_find_all_visits_each_order_once_for_any_page_size() {
    let (_backend, store) = setup();
    for id in 1..=13 {
        store.insert(&order(id)).await.unwrap();
    }

    for page_size in 1..=15 {
        let mut seen = scan_all(&store, page_size).await;
        seen.sort_unstable();
        assert_eq!(seen, (1..=13).collect::<Vec<_>>(), "page size {page_size}");
    }
}

#[tokio::test]
async fn test_find_all_single_call_respects_page_size() {
    let (_backend, store) = setup();
    for id in 1..=9 {
        store.insert(&order(id)).await.unwrap();
    }

    for page_size in 1..=10 {
        let result = store.find_all(Page::first(size(page_size))).await.unwrap();
        assert!(result.orders.len() <= page_size);
    }
}

#[tokio::test]
async fn test_find_all_fails_whole_page_on_corrupted_record() {
    let (backend, store) = setup();
    for id in 1..=3 {
        store.insert(&order(id)).await.unwrap();
    }
    backend.put_raw("order:2", b"not an order".to_vec());

    let err = store.find_all(Page::first(size(10))).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decoding);
    assert!(matches!(err, StoreError::Decoding { ref key, .. } if key == "order:2"));
}

#[tokio::test]
async fn test_find_all_skips_keys_deleted_after_scan() {
    let (backend, store) = setup();
    store.insert(&order(1)).await.unwrap();
    // Index entry whose primary record is gone, as seen by a scan racing a delete.
    index_only(&backend, "order:2").await;

    let result = store.find_all(Page::first(size(10))).await.unwrap();

    assert_eq!(result.orders, vec![order(1)]);
    assert_eq!(result.cursor, 0);
}

#[tokio::test]
async fn test_find_all_leaves_dangling_index_entries_in_place() {
    let (backend, store) = setup();
    index_only(&backend, "order:3").await;
    store.insert(&order(4)).await.unwrap();

    for page_size in [1, 2, 10] {
        assert_eq!(scan_all(&store, page_size).await, vec![4]);
    }
    // Skipping does not repair the index.
    assert!(backend.set_members(ORDER_INDEX_KEY).contains(&"order:3".to_string()));
    assert!(!backend.contains_key("order:3"));
}

#[tokio::test]
async fn test_offline_backend_is_backend_unavailable() {
    let (backend, store) = setup();
    store.insert(&order(1)).await.unwrap();
    backend.set_available(false);

    let results = [
        store.insert(&order(2)).await.map(|_| ()),
        store.find_by_id(OrderId(1)).await.map(|_| ()),
        store.update(&order(1)).await.map(|_| ()),
        store.delete_by_id(OrderId(1)).await.map(|_| ()),
        store.find_all(Page::first(size(5))).await.map(|_| ()),
        store.ping().await,
    ];
    for result in results {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::BackendUnavailable);
    }

    backend.set_available(true);
    assert!(!backend.contains_key("order:2"));
    assert_eq!(backend.set_members(ORDER_INDEX_KEY), vec!["order:1"]);
    assert_eq!(store.find_by_id(OrderId(1)).await.unwrap(), order(1));
}

#[tokio::test]
async fn test_pages_stream_yields_every_order() {
    let (_backend, store) = setup();
    for id in 1..=7 {
        store.insert(&order(id)).await.unwrap();
    }

    let pages: Vec<Vec<Order>> = store
        .pages(size(3))
        .into_stream()
        .try_collect()
        .await
        .expect("Failed to stream pages");

    assert!(pages.iter().all(|page| page.len() <= 3));
    let ids: BTreeSet<u64> = pages.iter().flatten().map(|o| o.order_id.0).collect();
    assert_eq!(ids, (1..=7).collect::<BTreeSet<u64>>());
}

#[tokio::test]
async fn test_pages_resume_from_cursor() {
    let (_backend, store) = setup();
    for id in 1..=6 {
        store.insert(&order(id)).await.unwrap();
    }

    let mut pages = store.pages(size(4));
    let first = pages.next_page().await.unwrap().unwrap();
    assert_eq!(first.len(), 4);
    assert!(!pages.is_done());

    let mut resumed = store.resume_pages(Page::resume(size(4), pages.cursor()));
    let second = resumed.next_page().await.unwrap().unwrap();
    assert_eq!(second.len(), 2);
    assert!(resumed.is_done());
    assert!(resumed.next_page().await.is_none());

    let ids: BTreeSet<u64> = first.iter().chain(&second).map(|o| o.order_id.0).collect();
    assert_eq!(ids, (1..=6).collect::<BTreeSet<u64>>());
}

#[tokio::test]
async fn test_pages_end_after_error() {
    let (backend, store) = setup();
    store.insert(&order(1)).await.unwrap();
    backend.set_available(false);

    let mut pages = store.pages(size(2));
    let err = pages.next_page().await.unwrap().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert_eq!(pages.cursor(), 0);
    assert!(pages.next_page().await.is_none());
}

/// Concurrent inserts of the same id: exactly one wins, the index holds one entry.
#[tokio::test]
async fn test_concurrent_duplicate_inserts() {
    let (backend, store) = setup();

    let mut handles = vec![];
    for customer in 0..10u64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut contender = order(42);
            contender.customer_id = CustomerId(customer);
            store.insert(&contender).await
        }));
    }

    let mut successful = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => successful += 1,
            Err(e) if e.kind() == ErrorKind::DuplicateKey => duplicates += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(successful, 1, "Expected exactly one insert to win");
    assert_eq!(duplicates, 9);
    assert_eq!(backend.set_members(ORDER_INDEX_KEY), vec!["order:42"]);
}

#[tokio::test]
async fn test_concurrent_inserts_and_deletes_keep_index_consistent() {
    let (backend, store) = setup();

    let mut handles = vec![];
    for id in 1..=20u64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.insert(&order(id)).await?;
            if id % 2 == 0 {
                store.delete_by_id(OrderId(id)).await?;
            }
            Ok::<_, StoreError>(())
        }));
    }
    for handle in handles {
        handle.await.unwrap().expect("Failed to insert/delete order");
    }

    let members = backend.set_members(ORDER_INDEX_KEY);
    assert_eq!(members.len(), 10);
    for id in 1..=20u64 {
        let key = format!("order:{id}");
        assert_eq!(backend.contains_key(&key), members.contains(&key), "{key}");
    }
}
