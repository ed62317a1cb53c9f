//! Slack interface for oppy - the volunteer-opportunity bot.
//!
//! - **Block Kit** (`blocks`) - typed message builders (buttons,
//!   multi-select dropdowns, result cards)
//! - **Events** (`events`) - envelope types, dispatcher, handlers
//! - **Flow** (`flow`) - the find/create opportunity interaction flow
//! - **Socket Mode** (`socket`) - transport loop with reconnection logic
//!
//! # Architecture
//!
//! ```text
//! Slack Events -> SocketModeRunner -> EventDispatcher -> OpportunityFlow
//!                       |                                   |        |
//!                  ack first                       SessionStore  OpportunitySource
//!                       |
//!                 Block Kit UI <- response
//! ```
//!
//! Acknowledgement is sent before any store or table I/O so the platform's
//! interaction deadline is always met; responses go back afterwards through
//! the transport's respond channel.

pub mod blocks;
pub mod events;
pub mod flow;
pub mod socket;
