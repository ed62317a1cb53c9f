use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use oppy_airtable::OpportunitySource;
use oppy_store::SessionStore;
use thiserror::Error;
use tracing::debug;

use crate::{
    blocks::MessageTemplate,
    flow::{FlowError, OpportunityFlow},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_ts: String,
    pub request_id: String,
}

/// A button click or dropdown change. `value` carries the button payload;
/// `selected_values` carries the dropdown selection (empty when the user
/// deselected everything, or when the payload was missing the field).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub user_id: String,
    pub action_id: String,
    pub value: Option<String>,
    pub selected_values: Vec<String>,
    pub request_id: Option<String>,
}

impl BlockActionEvent {
    /// Extracts the first action from a raw interaction payload.
    ///
    /// Fails closed: a payload without a user or action id is dropped
    /// (`None`); missing `selected_options` or `value` degrade to empty,
    /// never to an error.
    pub fn from_interaction_payload(payload: &serde_json::Value) -> Option<Self> {
        let user_id = payload.pointer("/user/id")?.as_str()?.to_owned();
        let action = payload.pointer("/actions/0")?;
        let action_id = action.get("action_id")?.as_str()?.to_owned();

        let channel_id = payload
            .pointer("/channel/id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let value = action.get("value").and_then(serde_json::Value::as_str).map(str::to_owned);
        let selected_values = action
            .get("selected_options")
            .and_then(serde_json::Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|option| option.get("value").and_then(serde_json::Value::as_str))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let request_id =
            payload.get("trigger_id").and_then(serde_json::Value::as_str).map(str::to_owned);

        Some(Self { channel_id, user_id, action_id, value, selected_values, request_id })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// Where a reply should land: the triggering channel, or a private
/// user-scoped message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseVisibility {
    InChannel,
    Ephemeral,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotResponse {
    pub message: MessageTemplate,
    pub visibility: ResponseVisibility,
}

impl BotResponse {
    pub fn in_channel(message: MessageTemplate) -> Self {
        Self { message, visibility: ResponseVisibility::InChannel }
    }

    pub fn ephemeral(message: MessageTemplate) -> Self {
        Self { message, visibility: ResponseVisibility::Ephemeral }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(BotResponse),
    Processed,
    Ignored,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error(transparent)]
    Flow(#[from] FlowError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Wires both handlers around one flow instance.
pub fn opportunity_dispatcher<S, D>(flow: Arc<OpportunityFlow<S, D>>) -> EventDispatcher
where
    S: SessionStore + 'static,
    D: OpportunitySource + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(flow.clone()));
    dispatcher.register(BlockActionHandler::new(flow));
    dispatcher
}

/// The slash command the bot responds to.
pub const SLASH_COMMAND: &str = "/oppy";

pub struct SlashCommandHandler<S, D> {
    flow: Arc<OpportunityFlow<S, D>>,
}

impl<S, D> SlashCommandHandler<S, D> {
    pub fn new(flow: Arc<OpportunityFlow<S, D>>) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl<S, D> EventHandler for SlashCommandHandler<S, D>
where
    S: SessionStore + 'static,
    D: OpportunitySource + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if payload.command != SLASH_COMMAND {
            return Err(EventHandlerError::UnsupportedCommand(payload.command.clone()));
        }

        Ok(HandlerResult::Responded(self.flow.menu()))
    }
}

pub struct BlockActionHandler<S, D> {
    flow: Arc<OpportunityFlow<S, D>>,
}

impl<S, D> BlockActionHandler<S, D> {
    pub fn new(flow: Arc<OpportunityFlow<S, D>>) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl<S, D> EventHandler for BlockActionHandler<S, D>
where
    S: SessionStore + 'static,
    D: OpportunitySource + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        debug!(
            event_name = "slack.block_action.received",
            correlation_id = %ctx.correlation_id,
            user_id = %event.user_id,
            action_id = %event.action_id,
            "handling block action"
        );

        match self.flow.handle_action(event).await? {
            Some(response) => Ok(HandlerResult::Responded(response)),
            None => Ok(HandlerResult::Processed),
        }
    }
}
