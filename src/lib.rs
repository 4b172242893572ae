//! ripple: a feed dispatch and enrichment engine.
//!
//! ripple ingests paginated feed records from a remote content service,
//! normalizes each into a [`ContentRecord`](model::ContentRecord), and
//! notifies consumers through typed event channels as each record (and
//! later its media) becomes ready. No record blocks the batch: enrichment
//! runs as registered tasks, a flaky album API gets bounded exponential
//! backoff, and a low-frequency heartbeat reports new content and
//! classifies failures.
//!
//! The engine is purely in-memory. Transport, sessions, and markup parsing
//! live behind the traits in [`service`]; plug in implementations and go:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # async fn demo(
//! #     service: Arc<dyn ripple::service::ContentService>,
//! #     parser: Arc<dyn ripple::service::MarkupParser>,
//! #     lookup: Arc<dyn ripple::service::NameLookup>,
//! # ) -> Result<(), ripple::error::FeedError> {
//! use ripple::engine::FeedEngine;
//! use ripple::config::EngineConfig;
//!
//! let engine = FeedEngine::new(service, parser, lookup, EngineConfig::default());
//! engine
//!     .events()
//!     .ready
//!     .subscribe("printer", |event| async move {
//!         println!("ready: {:?}", event.record.ordering_key());
//!         Ok(())
//!     })
//!     .await;
//!
//! engine.new_batch();
//! let accepted = engine.get_feeds_by_count(10, None).await?;
//! engine.wait(&["dispatch", "hook"]).await;
//! println!("{accepted} records processed");
//!
//! engine.heartbeat_start(Duration::from_secs(300));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod registry;
pub mod service;
pub mod tag;

pub use config::{DropRules, EngineConfig};
pub use engine::FeedEngine;
pub use error::{FeedError, ServiceError};
pub use event::{EventBus, HeartbeatFailure, RecordEvent};
pub use model::{BatchId, ContentRecord, Entity, RawRecord, VisualMedia};
