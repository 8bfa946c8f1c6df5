//! MDS Extract
//!
//! Pulls time-windowed records from remote tabular log sources, a bounded
//! number of requests at a time, and appends each outcome to a per-source
//! log file.

pub mod cli;
pub mod client;
pub mod config;
pub mod etl;
pub mod record;
pub mod scheduler;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use client::{Auth, DataClient, FetchFuture, FetchRequest, MdsClient};
pub use config::{RunConfig, RunParameters};
pub use etl::{Extractor, Transformer};
pub use record::{FieldValue, Record};
pub use scheduler::{ExtractionUnit, Outcome, RunSummary, Scheduler, TimeRange};
pub use storage::OutcomeSink;
pub use transform::{FormatError, RecordFormatter};
