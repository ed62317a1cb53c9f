//! Read-only client for the hosted tabular database that stores volunteer
//! opportunities.
//!
//! The backing API paginates its own responses and has no schema/metadata
//! endpoint, so this crate does two slightly unusual things on purpose:
//! - `query` exhausts every backing page and returns the whole matching
//!   record set in memory (bounds feasible table size, keeps paging trivial)
//! - `column_values` enumerates a dropdown's options by scanning the full
//!   table and deduplicating one projected column

pub mod client;
pub mod record;

pub use client::{AirtableClient, AirtableError, OpportunitySource};
pub use record::{FieldValue, OpportunityRecord};
