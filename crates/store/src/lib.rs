//! Per-user query-session persistence.
//!
//! The bot may run multiple instances or restart between interactions, so
//! session state lives in an external key-value store rather than process
//! memory. [`SessionStore`] is the seam: handlers depend on the trait, the
//! binary injects [`RedisSessionStore`], and tests inject
//! [`InMemorySessionStore`].

pub mod memory;
pub mod redis;

use std::collections::BTreeSet;

use async_trait::async_trait;
use oppy_core::session::{FilterField, QuerySession};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("session store connect failed: {0}")]
    Connect(String),
    #[error("session store backend failed: {0}")]
    Backend(String),
}

/// Scratch storage for in-progress searches, keyed by user identifier.
///
/// Absent sessions read back as the default (empty selections, offset 0);
/// none of the read paths distinguish "never searched" from "reset".
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Clears all filter fields and sets the offset to 0. Called when the
    /// user enters the find-opportunity flow.
    async fn reset(&self, user_id: &str) -> Result<(), StoreError>;

    /// Full replace of one filter field. An empty set clears that filter.
    async fn set_field(
        &self,
        user_id: &str,
        field: FilterField,
        values: BTreeSet<String>,
    ) -> Result<(), StoreError>;

    /// Adds `delta` to the stored offset, clamped at 0, and returns the
    /// stored result. A "previous" click at offset 0 stays at 0.
    async fn adjust_offset(&self, user_id: &str, delta: i64) -> Result<usize, StoreError>;

    /// Snapshot of the current session; absent sessions yield the default.
    async fn get(&self, user_id: &str) -> Result<QuerySession, StoreError>;
}

pub use memory::InMemorySessionStore;
pub use self::redis::RedisSessionStore;
