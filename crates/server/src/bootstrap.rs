use std::sync::Arc;

use oppy_airtable::{AirtableClient, AirtableError};
use oppy_core::config::{AppConfig, ConfigError, LoadOptions};
use oppy_slack::{
    events::opportunity_dispatcher,
    flow::OpportunityFlow,
    socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner, SocketTransport},
};
use oppy_store::{RedisSessionStore, StoreError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub session_store: Arc<RedisSessionStore>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("session store connection failed: {0}")]
    StoreConnect(#[source] StoreError),
    #[error("opportunity source setup failed: {0}")]
    Source(#[source] AirtableError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config, Arc::new(NoopSocketTransport)).await
}

/// The transport is a parameter so a real socket mode connection can be
/// wired in at the composition root without touching this function.
pub async fn bootstrap_with_config(
    config: AppConfig,
    transport: Arc<dyn SocketTransport>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let session_store = Arc::new(
        RedisSessionStore::connect(&config.session.redis_url, config.session.ttl_secs)
            .await
            .map_err(BootstrapError::StoreConnect)?,
    );
    info!(
        event_name = "system.bootstrap.session_store_connected",
        correlation_id = "bootstrap",
        "session store connection established"
    );

    let source = Arc::new(
        AirtableClient::new(
            config.airtable.endpoint_url.as_str(),
            config.airtable.base_id.as_str(),
            config.airtable.api_key.clone(),
        )
        .map_err(BootstrapError::Source)?,
    );

    let flow = Arc::new(OpportunityFlow::new(
        session_store.clone(),
        source,
        config.airtable.table.as_str(),
        config.airtable.create_form_url.as_str(),
    ));
    let dispatcher = opportunity_dispatcher(flow);

    let slack_runner = SocketModeRunner::new(transport, dispatcher, ReconnectPolicy::default());
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        "event dispatcher wired"
    );

    Ok(Application { config, session_store, slack_runner })
}
