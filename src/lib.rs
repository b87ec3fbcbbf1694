//! listing-history - recovers listing price histories from web-archive snapshots.
//!
//! The pipeline runs in three resumable phases: `index` downloads the
//! archive's snapshot index, `queue` turns it into durable work items, and
//! `fetch` retrieves each snapshot and extracts its price history.

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod admin;
pub mod cdx;
pub mod classify;
pub mod cli;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod http_client;
pub mod index;
pub mod migrations;
pub mod models;
pub mod queue;
pub mod rate_limit;
pub mod repository;
pub mod schema;
