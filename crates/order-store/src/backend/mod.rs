//! # Key-Value Backends
//!
//! The [`Backend`] trait is the seam between the [`OrderStore`](crate::OrderStore) and
//! the remote key-value store. It exposes only what the store needs: point reads,
//! batch reads, an update-only write, an incremental set scan, and atomic execution
//! of a [`Plan`].
//!
//! ## Transactions
//!
//! Multi-step writes go through [`Transaction`]. Conditions and commands are queued
//! locally and nothing reaches the backend until [`Transaction::commit`] is awaited.
//! The backend then checks every condition and applies every command as one atomic
//! unit, or applies nothing and reports which condition failed.
//!
//! Dropping a transaction without committing it discards the queued steps. Because
//! of that, early returns, `?` and caller cancellation all abort for free:
//!
//! ```rust
//! use order_store::backend::{Command, Condition, MemoryBackend, Outcome, Transaction};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), order_store::BackendError> {
//! let backend = MemoryBackend::new();
//!
//! let mut tx = Transaction::begin(&backend);
//! tx.require(Condition::Absent("order:1".into()))
//!     .queue(Command::Set { key: "order:1".into(), value: b"{}".to_vec() })
//!     .queue(Command::SetAdd { set: "orders".into(), member: "order:1".into() });
//! assert_eq!(tx.commit().await?, Outcome::Committed);
//!
//! // A second attempt is rejected as a whole.
//! let mut tx = Transaction::begin(&backend);
//! tx.require(Condition::Absent("order:1".into()))
//!     .queue(Command::Set { key: "order:1".into(), value: b"{}".to_vec() });
//! assert!(matches!(tx.commit().await?, Outcome::Rejected(_)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Implementations
//!
//! - [`RedisBackend`]: pooled Redis connections; plans run as one server-side script.
//! - [`MemoryBackend`]: in-process maps with the same semantics, for tests and local runs.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryBackend;
pub use self::redis::{RedisBackend, RedisConfig};

use crate::error::BackendError;
use async_trait::async_trait;
use tracing::trace;

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// A precondition checked atomically before a plan is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The key must not exist.
    Absent(String),
    /// The key must exist.
    Present(String),
}

/// A write queued in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: Vec<u8> },
    Delete { key: String },
    SetAdd { set: String, member: String },
    SetRemove { set: String, member: String },
}

/// The conditions and commands of one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub conditions: Vec<Condition>,
    pub commands: Vec<Command>,
}

/// Result of applying a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every condition held and every command was applied.
    Committed,
    /// This condition did not hold; nothing was applied.
    Rejected(Condition),
}

/// One step of an incremental set scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanBatch {
    pub members: Vec<String>,
    /// Continuation cursor; 0 when the scan is complete.
    pub cursor: u64,
}

/// Operations the order store needs from a key-value backend.
///
/// Implementations must be safe to share between concurrent callers without
/// external locking.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Checks that the backend is reachable.
    async fn ping(&self) -> BackendResult<()>;

    /// Reads one value.
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>>;

    /// Reads several values; the result is positionally aligned with `keys`.
    async fn get_many(&self, keys: &[String]) -> BackendResult<Vec<Option<Vec<u8>>>>;

    /// Overwrites `key` only if it already exists. Returns whether it was written.
    async fn set_existing(&self, key: &str, value: &[u8]) -> BackendResult<bool>;

    /// Runs one scan step over the members of `set`, starting at `cursor`
    /// (0 to start). Returns at most `count` members.
    async fn scan_set(
        &self,
        set: &str,
        cursor: u64,
        count: usize,
    ) -> BackendResult<ScanBatch>;

    /// Atomically checks the plan's conditions and applies its commands.
    async fn apply(&self, plan: &Plan) -> BackendResult<Outcome>;

    /// Releases pooled resources. Calls made afterwards fail.
    async fn close(&self) {}
}

/// A scoped atomic transaction against a [`Backend`].
///
/// See the [module documentation](self) for the commit and abort rules.
pub struct Transaction<'a> {
    backend: &'a dyn Backend,
    plan: Plan,
    finished: bool,
}

impl<'a> Transaction<'a> {
    /// Starts an empty transaction. Nothing is sent to the backend yet.
    pub fn begin(backend: &'a dyn Backend) -> Self {
        Self {
            backend,
            plan: Plan::default(),
            finished: false,
        }
    }

    /// Adds a precondition that must hold at commit time.
    pub fn require(&mut self, condition: Condition) -> &mut Self {
        self.plan.conditions.push(condition);
        self
    }

    /// Queues a command to apply at commit time.
    pub fn queue(&mut self, command: Command) -> &mut Self {
        self.plan.commands.push(command);
        self
    }

    /// Sends the whole plan to the backend as one atomic unit.
    pub async fn commit(mut self) -> BackendResult<Outcome> {
        self.finished = true;
        self.backend.apply(&self.plan).await
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            trace!(
                conditions = self.plan.conditions.len(),
                commands = self.plan.commands.len(),
                "Transaction discarded"
            );
        }
    }
}
