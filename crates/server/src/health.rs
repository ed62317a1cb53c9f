use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use oppy_store::RedisSessionStore;
use serde::Serialize;
use tracing::{error, info};

/// Liveness check against the session backend. The health endpoint depends
/// on this trait so tests can stub the store away.
#[async_trait]
pub trait StoreProbe: Send + Sync {
    async fn probe(&self) -> Result<(), String>;
}

#[async_trait]
impl StoreProbe for RedisSessionStore {
    async fn probe(&self) -> Result<(), String> {
        self.ping().await.map_err(|error| error.to_string())
    }
}

#[derive(Clone)]
pub struct HealthState {
    store: Arc<dyn StoreProbe>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub session_store: HealthCheck,
    pub checked_at: String,
}

pub fn router(store: Arc<dyn StoreProbe>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { store })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    store: Arc<dyn StoreProbe>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(store)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let session_store = store_check(state.store.as_ref()).await;
    let ready = session_store.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "oppy-server runtime initialized".to_string(),
        },
        session_store,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn store_check(store: &dyn StoreProbe) -> HealthCheck {
    match store.probe().await {
        Ok(()) => {
            HealthCheck { status: "ready", detail: "session store ping succeeded".to_string() }
        }
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("session store ping failed: {error}"),
        },
    }
}
