use std::collections::BTreeSet;

use std::future::Future;

use ::redis::{aio::ConnectionManager, AsyncCommands, Client};
use async_trait::async_trait;
use oppy_core::session::{FilterField, QuerySession};
use tracing::{debug, warn};

use crate::{SessionStore, StoreError};

/// Redis-backed [`SessionStore`].
///
/// Key layout, one namespace per user:
/// `user:{id}:volunteer_query:{field}` (sets) and
/// `user:{id}:volunteer_query:offset` (counter). Every write refreshes the
/// TTL so abandoned sessions expire instead of accumulating.
///
/// `adjust_offset` is a read-modify-write rather than an INCRBY so the
/// result can be clamped at 0; concurrent duplicate clicks from one user are
/// last-write-wins, which is acceptable for scratch state.
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: ConnectionManager,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(connect_error)?;
        let connection = client.get_tokio_connection_manager().await.map_err(connect_error)?;

        Ok(Self { connection, ttl_secs })
    }

    /// Round-trips a PING; used by the health endpoint.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        ::redis::cmd("PING")
            .query_async::<_, String>(&mut connection)
            .await
            .map(|_| ())
            .map_err(backend_error)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn reset(&self, user_id: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        let field_keys: Vec<String> =
            FilterField::ALL.iter().map(|field| field_key(user_id, *field)).collect();
        let _: () = connection.del(field_keys).await.map_err(backend_error)?;
        let _: () = connection
            .set_ex(offset_key(user_id), 0i64, self.ttl_secs)
            .await
            .map_err(backend_error)?;

        debug!(event_name = "session.store.reset", user_id, "session reset");
        Ok(())
    }

    async fn set_field(
        &self,
        user_id: &str,
        field: FilterField,
        values: BTreeSet<String>,
    ) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let key = field_key(user_id, field);

        let _: () = connection.del(&key).await.map_err(backend_error)?;
        if !values.is_empty() {
            let members: Vec<&str> = values.iter().map(String::as_str).collect();
            let _: () = connection.sadd(&key, members).await.map_err(backend_error)?;
            let _: () = connection.expire(&key, self.ttl_secs as i64).await.map_err(backend_error)?;
        }

        debug!(
            event_name = "session.store.field_set",
            user_id,
            field = field.storage_key(),
            value_count = values.len(),
            "filter field replaced"
        );
        Ok(())
    }

    async fn adjust_offset(&self, user_id: &str, delta: i64) -> Result<usize, StoreError> {
        let mut connection = self.connection.clone();
        let key = offset_key(user_id);

        let stored: Option<i64> = read_with_retry("offset_get", || {
            let mut connection = self.connection.clone();
            let key = key.clone();
            async move { connection.get(key).await }
        })
        .await?;
        let adjusted = stored.unwrap_or(0).saturating_add(delta).max(0);
        let _: () =
            connection.set_ex(&key, adjusted, self.ttl_secs).await.map_err(backend_error)?;

        Ok(adjusted as usize)
    }

    async fn get(&self, user_id: &str) -> Result<QuerySession, StoreError> {
        let mut session = QuerySession::default();
        for field in FilterField::ALL {
            let members: Vec<String> = read_with_retry("field_members", || {
                let mut connection = self.connection.clone();
                let key = field_key(user_id, field);
                async move { connection.smembers(key).await }
            })
            .await?;
            session.set_selections(field, members.into_iter().collect());
        }

        let stored: Option<i64> = read_with_retry("offset_get", || {
            let mut connection = self.connection.clone();
            let key = offset_key(user_id);
            async move { connection.get(key).await }
        })
        .await?;
        session.offset = stored.unwrap_or(0).max(0) as usize;

        Ok(session)
    }
}

/// Idempotent reads get one retry before the failure surfaces to the user.
/// Writes are not retried; a duplicate write after an ambiguous failure
/// could double-apply an offset adjustment.
async fn read_with_retry<T, F, Fut>(operation: &'static str, mut read: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ::redis::RedisError>>,
{
    match read().await {
        Ok(value) => Ok(value),
        Err(error) => {
            warn!(
                event_name = "session.store.read_retry",
                operation,
                error = %error,
                "transient session read failure; retrying once"
            );
            read().await.map_err(backend_error)
        }
    }
}

fn field_key(user_id: &str, field: FilterField) -> String {
    format!("user:{user_id}:volunteer_query:{}", field.storage_key())
}

fn offset_key(user_id: &str) -> String {
    format!("user:{user_id}:volunteer_query:offset")
}

fn connect_error(error: ::redis::RedisError) -> StoreError {
    StoreError::Connect(error.to_string())
}

fn backend_error(error: ::redis::RedisError) -> StoreError {
    StoreError::Backend(error.to_string())
}
