//! File system storage operations
//!
//! The only storage concern of an extraction run is the outcome sink: one
//! append-only log file per source, mirrored to the console.

mod sink;

pub use sink::OutcomeSink;
