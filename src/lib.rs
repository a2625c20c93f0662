//! Salesbot - purchase webhook ingestion and Web Push fan-out for a
//! digital product sales site.
//!
//! Purchase platform callbacks are verified, parsed and stored idempotently
//! by transaction id. Browser push subscriptions are collected from the site
//! and notified on operator request, with dead endpoints pruned as they are found.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod faq;
pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod models;
pub mod push;
pub mod rate_limit;
pub mod store;
