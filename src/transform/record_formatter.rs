//! Record formatter
//!
//! Turns one record into a single comma-separated output line prefixed with
//! the source name.

use crate::etl::Transformer;
use crate::record::Record;
use eyre::Result;
use std::fmt::Write;
use std::sync::Arc;

/// Errors raised while formatting a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A requested column is not present in the record
    KeyNotFound(String),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyNotFound(column) => {
                write!(f, "KeyNotFound: column '{}' is not present in the record", column)
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Transformer that renders records as `source, field1, field2, ...`
///
/// With an empty column list every field is written in the record's natural
/// order. Otherwise exactly the listed columns are written, in list order.
///
/// # Example
/// ```
/// use mds_extract::etl::Transformer;
/// use mds_extract::record::Record;
/// use mds_extract::transform::RecordFormatter;
///
/// let formatter = RecordFormatter::new("WebLogs", vec!["b".to_string(), "a".to_string()]);
/// let record = Record::new().with("a", 1i64).with("b", "two");
///
/// assert_eq!(formatter.transform(record).unwrap(), "WebLogs, two, 1");
/// ```
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    source: String,
    columns: Arc<[String]>,
}

impl RecordFormatter {
    /// Create a formatter for records from `source`
    pub fn new(source: impl Into<String>, columns: impl Into<Arc<[String]>>) -> Self {
        Self {
            source: source.into(),
            columns: columns.into(),
        }
    }

    /// Format one record without taking ownership of it
    ///
    /// # Errors
    /// Returns [`FormatError::KeyNotFound`] when a requested column is missing.
    pub fn format(&self, record: &Record) -> Result<String, FormatError> {
        let mut line = self.source.clone();

        if self.columns.is_empty() {
            for (_, value) in record.iter() {
                // Writing to a String cannot fail
                let _ = write!(line, ", {}", value);
            }
        } else {
            for column in self.columns.iter() {
                let value = record
                    .get(column)
                    .ok_or_else(|| FormatError::KeyNotFound(column.clone()))?;
                let _ = write!(line, ", {}", value);
            }
        }

        Ok(line)
    }
}

impl Transformer for RecordFormatter {
    type Input = Record;
    type Output = String;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(self.format(&input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use chrono::{TimeZone, Utc};

    fn sample() -> Record {
        Record::new()
            .with(
                "PreciseTimeStamp",
                Utc.with_ymd_and_hms(2015, 4, 16, 0, 5, 9).unwrap(),
            )
            .with("S_sitename", "contoso")
            .with("Cs_bytes", 12_345i64)
            .with("S_reason", FieldValue::Null)
    }

    #[test]
    fn test_all_columns_in_natural_order() {
        let formatter = RecordFormatter::new("Logs", Vec::<String>::new());
        let line = formatter.format(&sample()).unwrap();
        assert_eq!(line, "Logs, 2015-04-16T00:05:09Z, contoso, 12345, ");
    }

    #[test]
    fn test_selected_columns_in_requested_order() {
        let formatter = RecordFormatter::new(
            "Logs",
            vec!["Cs_bytes".to_string(), "PreciseTimeStamp".to_string()],
        );
        let line = formatter.format(&sample()).unwrap();
        assert_eq!(line, "Logs, 12345, 2015-04-16T00:05:09Z");
    }

    #[test]
    fn test_missing_column_is_key_not_found() {
        let formatter = RecordFormatter::new("Logs", vec!["Missing".to_string()]);
        let err = formatter.format(&sample()).unwrap_err();
        assert_eq!(err, FormatError::KeyNotFound("Missing".to_string()));

        let err = formatter.transform(sample()).unwrap_err();
        assert!(err.downcast_ref::<FormatError>().is_some());
    }

    #[test]
    fn test_empty_record_renders_source_only() {
        let formatter = RecordFormatter::new("Logs", Vec::<String>::new());
        assert_eq!(formatter.format(&Record::new()).unwrap(), "Logs");
    }
}
