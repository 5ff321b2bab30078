//! Lazy, resumable iteration over all stored orders, one page at a time.

use crate::error::StoreError;
use crate::model::Order;
use crate::store::{OrderStore, Page};
use futures::stream::{self, Stream};

/// A page sequence over the order index.
///
/// Each [`next_page`](Self::next_page) call performs one
/// [`find_all`](OrderStore::find_all) step. The sequence ends once the backend hands
/// back cursor `0`, or after the first error. [`cursor`](Self::cursor) is the token
/// to continue from, e.g. with [`OrderStore::resume_pages`] after an error.
///
/// ```rust
/// use order_store::{MemoryBackend, OrderStore};
/// use std::num::NonZeroUsize;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), order_store::StoreError> {
/// let store = OrderStore::new(Arc::new(MemoryBackend::new()));
/// let mut pages = store.pages(NonZeroUsize::new(50).unwrap());
/// while let Some(page) = pages.next_page().await {
///     for order in page? {
///         println!("{}", order.order_id);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct OrderPages {
    store: OrderStore,
    page: Page,
    done: bool,
}

impl OrderPages {
    pub(crate) fn new(store: OrderStore, page: Page) -> Self {
        Self {
            store,
            page,
            done: false,
        }
    }

    /// The cursor the next step will start from.
    pub fn cursor(&self) -> u64 {
        self.page.cursor
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetches the next page, or `None` once the sequence has ended.
    pub async fn next_page(&mut self) -> Option<Result<Vec<Order>, StoreError>> {
        if self.done {
            return None;
        }
        match self.store.find_all(self.page).await {
            Ok(result) => {
                self.done = result.is_last();
                self.page.cursor = result.cursor;
                Some(Ok(result.orders))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    /// Turns the sequence into a [`Stream`] of pages.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<Order>, StoreError>> {
        stream::unfold(self, |mut pages| async move {
            let page = pages.next_page().await?;
            Some((page, pages))
        })
    }
}
