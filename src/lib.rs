//! In-memory OTLP telemetry repository.
//!
//! The repository behind a live observability dashboard: it ingests
//! OpenTelemetry traces, logs and metrics, keeps them in bounded memory, and
//! answers the paged and filtered queries that render resource lists, trace
//! waterfalls, log tables and metric charts.
//!
//! # Features
//!
//! - **Best-effort ingestion**: malformed items are counted and skipped, the
//!   rest of the batch is stored
//! - **Stable paging**: every query reads one immutable snapshot
//! - **Bounded memory**: FIFO eviction per trace store, log resource and
//!   metric series
//! - **Trace waterfalls**: span trees that tolerate orphans, clock skew and
//!   cycles, with ancestor-aware text filtering
//! - **Export/import**: OTLP-flavored JSON documents and zip archives
//!
//! # Architecture
//!
//! - `core`: ids, span model, configuration and errors
//! - `resource`: resource identity and grouping
//! - `storage`, `logs`, `metrics`: the typed stores
//! - `repository`: ingestion, queries and change notifications
//! - `waterfall`: span tree reconstruction and filtering
//! - `health`: health status aggregation
//! - `export`: JSON/zip codec
//!
//! # Example
//!
//! ```no_run
//! use telemetry_repository::query::GetLogsContext;
//! use telemetry_repository::{AddContext, Config, TelemetryRepository};
//!
//! # fn main() -> telemetry_repository::Result<()> {
//! let repo = TelemetryRepository::new(Config::default())?;
//! let mut ctx = AddContext::new();
//! repo.add_logs(&mut ctx, &[]);
//!
//! let page = repo.get_logs(&GetLogsContext {
//!     count: 100,
//!     ..Default::default()
//! })?;
//! println!("{} logs", page.total_count);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod export;
pub mod health;
pub mod logs;
pub mod metrics;
pub mod query;
pub mod repository;
pub mod resource;
pub mod storage;
pub mod waterfall;

// Re-export core types for convenience
pub use crate::core::{Config, RepositoryError, Result};
pub use crate::repository::{AddContext, RepositoryEvent, Subscription, TelemetryRepository};
pub use crate::resource::{ResourceKey, ResourceKind};
