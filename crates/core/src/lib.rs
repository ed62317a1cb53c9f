//! Core domain for oppy: volunteer-opportunity search sessions.
//!
//! This crate holds the pure, I/O-free pieces of the bot:
//! - **Query sessions** (`session`) - per-user filter selections and offset
//! - **Filter translation** (`filter`) - selections -> table filter formula
//! - **Result paging** (`pager`) - offset slicing with next/prev availability
//! - **Configuration** (`config`) - file + env + override layering
//!
//! Everything that talks to Slack, Redis, or the table API lives in the
//! sibling crates and depends on the types defined here.

pub mod config;
pub mod filter;
pub mod pager;
pub mod session;

pub use filter::FilterExpression;
pub use pager::{page, ResultPage};
pub use session::{FilterField, QuerySession, PAGE_SIZE};
