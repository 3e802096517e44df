//! Meilisearch over HTTP for meilibridge.
//!
//! [`MeiliClient`] implements [`meilibridge::SearchEngine`] against the
//! engine's REST API with bearer-key authentication and a per-request
//! timeout.

pub mod client;
pub mod types;

pub use client::MeiliClient;
