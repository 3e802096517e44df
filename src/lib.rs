//! # meilibridge
//!
//! Delegates a content framework's full-text search to a Meilisearch engine.
//!
//! The write side maps each record to a flat document and keeps one remote
//! index per content model, rebuilt with a `hard`, `soft` or `delta` update
//! strategy. The read side fans a query out to the index of every model under
//! the queried one, merges the hits into one relevance order, and hands the
//! ranked ids back to the relational store.
//!
//! The engine, the model registry, the record store and the shared cache are
//! all traits ([`SearchEngine`], [`ContentTypes`], [`RecordStore`],
//! [`SharedCache`]), so the core runs against anything implementing them.
//! `meilibridge-client` provides the HTTP engine.
//!
//! ```rust,no_run
//! use meilibridge::{BridgeConfig, InMemoryCache, ModelCatalog, SearchBackend, SearchOptions};
//! # use std::sync::Arc;
//! # async fn run(
//! #     engine: Arc<dyn meilibridge::SearchEngine>,
//! #     store: Arc<dyn meilibridge::RecordStore>,
//! # ) -> meilibridge::Result<()> {
//! let backend = SearchBackend::new(
//!     engine,
//!     Arc::new(InMemoryCache::new()),
//!     Arc::new(ModelCatalog::new()),
//!     store,
//!     BridgeConfig::from_env()?,
//! );
//! let results = backend.search("sourdough", "wagtailcore.Page", SearchOptions::default());
//! let page = results.window(0, Some(10)).results().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod query;
pub mod results;
pub mod types;

pub use backend::{SearchBackend, SearchOptions};
pub use cache::{InMemoryCache, NoCache, SharedCache};
pub use config::{BridgeConfig, DeltaWindow, FanOutMode, UpdateStrategy};
pub use engine::SearchEngine;
pub use error::{BridgeError, Result};
pub use index::{IndexRegistry, IndexSink, ModelIndex, Rebuilder};
pub use model::{ContentTypes, ModelCatalog, ModelDescriptor, SearchField, SearchRecord};
pub use results::{RecordStore, SearchResults};
pub use types::{FieldValue, IndexedDocument, Operator, RecordId, SearchTerms};
