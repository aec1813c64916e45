// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod store;
pub mod summarize;

// ---- Re-exports ----
pub use crate::config::AppConfig;
pub use crate::ingest::types::{Collector, NormalizedItem, RawRecord, Service, Source, SourceKind};
pub use crate::notify::Notifier;
pub use crate::pipeline::{ItemOutcome, MaintenanceAction, Pipeline};
pub use crate::store::Store;
pub use crate::summarize::{Importance, Summarizer, Summary};
