//! Transform implementations for extracted records

mod record_formatter;

pub use record_formatter::{FormatError, RecordFormatter};
