use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use oppy_core::session::{FilterField, QuerySession};
use tokio::sync::Mutex;

use crate::{SessionStore, StoreError};

/// Process-local [`SessionStore`] used by tests and local development runs.
/// Same observable semantics as the Redis store, minus expiry.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, QuerySession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn reset(&self, user_id: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(user_id.to_owned(), QuerySession::default());
        Ok(())
    }

    async fn set_field(
        &self,
        user_id: &str,
        field: FilterField,
        values: BTreeSet<String>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(user_id.to_owned()).or_default().set_selections(field, values);
        Ok(())
    }

    async fn adjust_offset(&self, user_id: &str, delta: i64) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(user_id.to_owned()).or_default();
        let adjusted = (session.offset as i64).saturating_add(delta).max(0);
        session.offset = adjusted as usize;
        Ok(session.offset)
    }

    async fn get(&self, user_id: &str) -> Result<QuerySession, StoreError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(user_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use oppy_core::session::{FilterField, QuerySession, PAGE_SIZE};

    use super::InMemorySessionStore;
    use crate::SessionStore;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[tokio::test]
    async fn absent_session_reads_back_as_default() {
        let store = InMemorySessionStore::new();
        let session = store.get("U1").await.expect("get");
        assert_eq!(session, QuerySession::default());
    }

    #[tokio::test]
    async fn reset_discards_prior_state() {
        let store = InMemorySessionStore::new();
        store.set_field("U1", FilterField::Location, set(&["Remote"])).await.expect("set");
        store.adjust_offset("U1", 6).await.expect("adjust");

        store.reset("U1").await.expect("reset");

        let session = store.get("U1").await.expect("get");
        assert_eq!(session, QuerySession::default());
    }

    #[tokio::test]
    async fn set_field_with_empty_set_clears_the_filter() {
        let store = InMemorySessionStore::new();
        store.set_field("U1", FilterField::AreaOfFocus, set(&["Education"])).await.expect("set");
        store.set_field("U1", FilterField::AreaOfFocus, BTreeSet::new()).await.expect("clear");

        let session = store.get("U1").await.expect("get");
        assert!(session.areas_of_focus.is_empty());
    }

    #[tokio::test]
    async fn adjust_offset_clamps_at_zero() {
        let store = InMemorySessionStore::new();
        let offset = store.adjust_offset("U1", -(PAGE_SIZE as i64)).await.expect("adjust");
        assert_eq!(offset, 0);

        store.adjust_offset("U1", PAGE_SIZE as i64).await.expect("adjust");
        store.adjust_offset("U1", -(2 * PAGE_SIZE as i64)).await.expect("adjust");

        let session = store.get("U1").await.expect("get");
        assert_eq!(session.offset, 0);
    }

    #[tokio::test]
    async fn offsets_accumulate_page_by_page() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.adjust_offset("U1", 3).await.expect("adjust"), 3);
        assert_eq!(store.adjust_offset("U1", 3).await.expect("adjust"), 6);
        assert_eq!(store.adjust_offset("U1", -3).await.expect("adjust"), 3);
    }

    #[tokio::test]
    async fn sessions_are_scoped_per_user() {
        let store = InMemorySessionStore::new();
        store.set_field("U1", FilterField::Location, set(&["Remote"])).await.expect("set");

        let other = store.get("U2").await.expect("get");
        assert!(other.locations.is_empty());
    }
}
