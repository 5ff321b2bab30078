//! # In-Memory Backend
//!
//! [`MemoryBackend`] keeps values and sets in process memory behind a single mutex.
//! It follows the same contract as [`RedisBackend`](super::RedisBackend): plans are
//! applied atomically, update-only writes never create keys, and set scans return at
//! most `count` members per step.
//!
//! It doubles as the test double for the store. Failures that are hard to provoke
//! against a real server are one call away:
//!
//! | Helper | Effect |
//! |--------|--------|
//! | [`set_available(false)`](MemoryBackend::set_available) | every call fails with [`BackendError::Unavailable`] |
//! | [`put_raw`](MemoryBackend::put_raw) | stores arbitrary bytes, e.g. a corrupted record |
//! | [`contains_key`](MemoryBackend::contains_key) / [`set_members`](MemoryBackend::set_members) | inspect state without going through the store |
//!
//! Scan cursors are offsets into the sorted member list, so a scan over an unchanged
//! set visits each member exactly once.

use super::{Backend, BackendResult, Command, Condition, Outcome, Plan, ScanBatch};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct State {
    values: HashMap<String, Vec<u8>>,
    sets: HashMap<String, BTreeSet<String>>,
    available: bool,
    closed: bool,
}

/// Key-value backend held entirely in memory.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                values: HashMap::new(),
                sets: HashMap::new(),
                available: true,
                closed: false,
            }),
        }
    }

    /// Simulates losing (or regaining) the connection to the store.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Writes a value directly, bypassing the index and any encoding.
    pub fn put_raw(&self, key: impl Into<String>, value: Vec<u8>) {
        self.lock().values.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().values.contains_key(key)
    }

    /// Returns the members of `set` in scan order.
    pub fn set_members(&self, set: &str) -> Vec<String> {
        self.lock()
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the state for a backend call, failing if the backend is offline.
    fn connect(&self) -> BackendResult<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.closed {
            return Err(BackendError::Unavailable("memory backend closed".into()));
        }
        if !state.available {
            return Err(BackendError::Unavailable("memory backend offline".into()));
        }
        Ok(state)
    }
}

impl State {
    fn holds(&self, condition: &Condition) -> bool {
        match condition {
            Condition::Absent(key) => !self.values.contains_key(key),
            Condition::Present(key) => self.values.contains_key(key),
        }
    }

    fn run(&mut self, command: &Command) {
        match command {
            Command::Set { key, value } => {
                self.values.insert(key.clone(), value.clone());
            }
            Command::Delete { key } => {
                self.values.remove(key);
            }
            Command::SetAdd { set, member } => {
                self.sets
                    .entry(set.clone())
                    .or_default()
                    .insert(member.clone());
            }
            Command::SetRemove { set, member } => {
                if let Some(members) = self.sets.get_mut(set) {
                    members.remove(member);
                    if members.is_empty() {
                        self.sets.remove(set);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn ping(&self) -> BackendResult<()> {
        self.connect().map(|_| ())
    }

    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        Ok(self.connect()?.values.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> BackendResult<Vec<Option<Vec<u8>>>> {
        let state = self.connect()?;
        Ok(keys.iter().map(|key| state.values.get(key).cloned()).collect())
    }

    async fn set_existing(&self, key: &str, value: &[u8]) -> BackendResult<bool> {
        let mut state = self.connect()?;
        match state.values.get_mut(key) {
            Some(slot) => {
                *slot = value.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn scan_set(&self, set: &str, cursor: u64, count: usize) -> BackendResult<ScanBatch> {
        let state = self.connect()?;
        let Some(members) = state.sets.get(set) else {
            return Ok(ScanBatch::default());
        };

        let offset = usize::try_from(cursor).unwrap_or(usize::MAX);
        let page: Vec<String> = members.iter().skip(offset).take(count).cloned().collect();
        let next = offset.saturating_add(page.len());
        let cursor = if page.is_empty() || next >= members.len() {
            0
        } else {
            next as u64
        };

        Ok(ScanBatch {
            members: page,
            cursor,
        })
    }

    async fn apply(&self, plan: &Plan) -> BackendResult<Outcome> {
        let mut state = self.connect()?;
        if let Some(failed) = plan.conditions.iter().find(|c| !state.holds(c)) {
            return Ok(Outcome::Rejected(failed.clone()));
        }
        for command in &plan.commands {
            state.run(command);
        }
        Ok(Outcome::Committed)
    }

    async fn close(&self) {
        self.lock().closed = true;
    }
}
