//! API key pool: round-robin credential rotation with permanent per-run
//! exclusion of failed keys.
//!
//! The pool itself is immutable. Rotation position and the failed set live
//! in a [`PoolState`] value that every operation takes and returns, so a
//! caller can snapshot, replay or share state without hidden mutation:
//!
//! ```rust
//! use pdf2questions::keys::{KeyPool, PoolState};
//!
//! let pool = KeyPool::new(["k1", "k2"]);
//! let state = PoolState::default();
//! let (lease, state) = pool.next(&state).unwrap();
//! assert_eq!(lease.index, 0);
//! let state = pool.mark_failed(&state, lease.key);
//! let (lease, _) = pool.next(&state).unwrap();
//! assert_eq!(lease.index, 1);
//! ```

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// One service credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw secret, for the request header only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Ordered, de-duplicated credentials for one extraction run.
#[derive(Debug, Clone)]
pub struct KeyPool {
    keys: Vec<ApiKey>,
}

/// Rotation cursor plus the indices of keys retired this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolState {
    cursor: usize,
    failed: BTreeSet<usize>,
}

impl PoolState {
    /// Pool index the next rotation starts from.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.contains(&index)
    }
}

/// A key handed out by [`KeyPool::next`].
#[derive(Debug, Clone, Copy)]
pub struct KeyLease<'a> {
    /// Position in the pool; safe to log.
    pub index: usize,
    pub key: &'a ApiKey,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("all {total} API keys have failed")]
pub struct PoolExhausted {
    pub total: usize,
}

impl KeyPool {
    /// Build a pool from raw strings. Entries are trimmed, blanks dropped and
    /// duplicates removed keeping the first occurrence.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<ApiKey> = Vec::new();
        for raw in keys {
            let trimmed = raw.as_ref().trim();
            if trimmed.is_empty() || out.iter().any(|k| k.expose() == trimmed) {
                continue;
            }
            out.push(ApiKey::new(trimmed));
        }
        Self { keys: out }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApiKey> {
        self.keys.iter()
    }

    pub fn active_count(&self, state: &PoolState) -> usize {
        self.keys.len().saturating_sub(state.failed.len())
    }

    pub fn is_exhausted(&self, state: &PoolState) -> bool {
        self.active_count(state) == 0
    }

    /// Next active key at or after the cursor, wrapping around.
    ///
    /// The returned state's cursor points just past the chosen key, so the
    /// cursor moves once per call however many failed keys were skipped.
    pub fn next(&self, state: &PoolState) -> Result<(KeyLease<'_>, PoolState), PoolExhausted> {
        let total = self.keys.len();
        if self.is_exhausted(state) {
            return Err(PoolExhausted { total });
        }
        let index = (0..total)
            .map(|offset| (state.cursor + offset) % total)
            .find(|i| !state.failed.contains(i))
            .ok_or(PoolExhausted { total })?;
        let next_state = PoolState {
            cursor: (index + 1) % total,
            failed: state.failed.clone(),
        };
        Ok((
            KeyLease {
                index,
                key: &self.keys[index],
            },
            next_state,
        ))
    }

    /// Retire `key` for the rest of the run. Idempotent; unknown keys are ignored.
    pub fn mark_failed(&self, state: &PoolState, key: &ApiKey) -> PoolState {
        match self.keys.iter().position(|k| k == key) {
            Some(index) => self.mark_failed_at(state, index),
            None => state.clone(),
        }
    }

    /// Retire the key at `index`. Out-of-range indices are ignored.
    pub fn mark_failed_at(&self, state: &PoolState, index: usize) -> PoolState {
        let mut next = state.clone();
        if index < self.keys.len() {
            next.failed.insert(index);
        }
        next
    }
}
