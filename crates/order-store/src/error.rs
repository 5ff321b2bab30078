//! # Store Errors
//!
//! Every failure of an [`OrderStore`](crate::OrderStore) operation is surfaced as a
//! [`StoreError`]. Each variant carries the key it concerns and, where there is one,
//! the underlying cause as its `source()`, so callers can log the full chain.
//!
//! To branch on the failure without matching on fields, use [`StoreError::kind`]:
//!
//! ```rust
//! use order_store::{ErrorKind, StoreError};
//!
//! fn status_for(err: &StoreError) -> u16 {
//!     match err.kind() {
//!         ErrorKind::NotFound => 404,
//!         ErrorKind::DuplicateKey => 409,
//!         ErrorKind::Encoding | ErrorKind::Decoding => 500,
//!         ErrorKind::BackendUnavailable => 503,
//!     }
//! }
//!
//! let err = StoreError::NotFound { key: "order:1".into() };
//! assert_eq!(status_for(&err), 404);
//! ```

use std::fmt;
use thiserror::Error;

/// The kinds of failure a store operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    DuplicateKey,
    Encoding,
    Decoding,
    BackendUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::Encoding => "encoding_error",
            ErrorKind::Decoding => "decoding_error",
            ErrorKind::BackendUnavailable => "backend_unavailable",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during order store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The target key does not exist.
    #[error("order not found: {key}")]
    NotFound { key: String },

    /// An insert targeted a key that already exists.
    #[error("order already exists: {key}")]
    DuplicateKey { key: String },

    /// The order could not be serialized. No backend call was made.
    #[error("could not encode order {key}")]
    Encoding {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The key exists but its stored bytes are not a valid order.
    #[error("could not decode order {key}")]
    Decoding {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Transport, connectivity or transaction execution fault.
    #[error("order backend unavailable")]
    BackendUnavailable(#[from] BackendError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            StoreError::Encoding { .. } => ErrorKind::Encoding,
            StoreError::Decoding { .. } => ErrorKind::Decoding,
            StoreError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
        }
    }
}

/// Errors raised by a [`Backend`](crate::backend::Backend) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis connection pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("failed to create redis connection pool: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),

    /// The server scan cursor no longer fits into the packed page cursor.
    #[error("scan cursor out of range: {0}")]
    CursorOverflow(u64),

    #[error("unexpected reply from backend: {0}")]
    UnexpectedReply(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}
