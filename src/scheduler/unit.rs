//! Extraction units and the blocks they produce

use super::TimeRange;
use crate::client::FetchRequest;
use crate::etl::Transformer;
use crate::record::{Record, TIMESTAMP_FORMAT};
use crate::transform::RecordFormatter;
use chrono::{DateTime, Utc};
use eyre::Result;
use std::fmt::Display;

/// One (source, slice) extraction request
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionUnit {
    source: String,
    range: TimeRange,
    started_at: DateTime<Utc>,
}

impl ExtractionUnit {
    /// Create a unit that starts now
    pub fn new(source: impl Into<String>, range: TimeRange) -> Self {
        Self::started_at(source, range, Utc::now())
    }

    pub fn started_at(
        source: impl Into<String>,
        range: TimeRange,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            range,
            started_at,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole seconds since the unit started
    pub fn elapsed_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// The fetch this unit issues
    pub fn request(&self, query: &str) -> FetchRequest {
        FetchRequest {
            source: self.source.clone(),
            from: self.range.from,
            to: self.range.to,
            query: query.to_string(),
        }
    }

    fn header(&self, tail: impl Display) -> String {
        format!(
            "{}, {}, {}, {}secs, {}",
            self.source,
            self.range.from.format(TIMESTAMP_FORMAT),
            self.range.to.format(TIMESTAMP_FORMAT),
            self.elapsed_secs(),
            tail
        )
    }

    /// Turn a fetch result into the block written to the sink
    ///
    /// Records are formatted here, so a formatting error becomes a failure
    /// block for this unit only.
    pub fn outcome(&self, result: Result<Vec<Record>>, formatter: &RecordFormatter) -> Outcome {
        match result.and_then(|records| formatter.transform_many(records)) {
            Ok(lines) => {
                let mut block = self.header(format_args!("{} records", lines.len()));
                block.push('\n');
                for line in &lines {
                    block.push_str(line);
                    block.push('\n');
                }
                block.push('\n');
                Outcome::Success {
                    records: lines.len(),
                    block,
                }
            }
            Err(error) => self.failure(&error),
        }
    }

    /// Failure block for an error that ended this unit
    pub fn failure(&self, error: &eyre::Report) -> Outcome {
        // Keep the header on one line whatever the error text contains
        let error = format!("{:#}", error)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let block = format!("{}\n\n", self.header(&error));
        Outcome::Failure { error, block }
    }
}

/// The routed result of one unit
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { records: usize, block: String },
    Failure { error: String, block: String },
}

impl Outcome {
    pub fn block(&self) -> &str {
        match self {
            Self::Success { block, .. } | Self::Failure { block, .. } => block,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn unit() -> ExtractionUnit {
        let from = Utc.with_ymd_and_hms(2015, 4, 16, 0, 0, 0).unwrap();
        let range = TimeRange::new(from, from + TimeDelta::minutes(15));
        ExtractionUnit::started_at("Logs", range, Utc::now() - TimeDelta::seconds(3))
    }

    #[test]
    fn test_elapsed_is_derived() {
        let unit = unit();
        assert!(unit.elapsed_secs() >= 3);
    }

    #[test]
    fn test_request() {
        let unit = unit();
        let request = unit.request("Sc_status = 400");
        assert_eq!(request.source, "Logs");
        assert_eq!(request.from, unit.range().from);
        assert_eq!(request.to, unit.range().to);
        assert_eq!(request.query, "Sc_status = 400");
    }

    #[test]
    fn test_success_block() {
        let unit = unit();
        let formatter = RecordFormatter::new("Logs", vec!["b".to_string(), "a".to_string()]);
        let records = vec![
            Record::new().with("a", 1i64).with("b", "x"),
            Record::new().with("a", 2i64).with("b", "y"),
        ];

        let outcome = unit.outcome(Ok(records), &formatter);
        assert!(outcome.is_success());

        let lines: Vec<_> = outcome.block().split('\n').collect();
        assert!(lines[0].starts_with("Logs, 2015-04-16T00:00:00Z, 2015-04-16T00:15:00Z, "));
        assert!(lines[0].ends_with("secs, 2 records"));
        assert_eq!(lines[1], "Logs, x, 1");
        assert_eq!(lines[2], "Logs, y, 2");
        assert_eq!(&lines[3..], &["", ""]);
    }

    #[test]
    fn test_empty_success_block() {
        let formatter = RecordFormatter::new("Logs", Vec::<String>::new());
        let outcome = unit().outcome(Ok(Vec::new()), &formatter);
        assert!(matches!(outcome, Outcome::Success { records: 0, .. }));
        assert!(outcome.block().ends_with("secs, 0 records\n\n"));
    }

    #[test]
    fn test_fetch_error_block() {
        let formatter = RecordFormatter::new("Logs", Vec::<String>::new());
        let error = eyre::eyre!("connection reset\nby peer").wrap_err("Failed to fetch");
        let outcome = unit().outcome(Err(error), &formatter);

        match &outcome {
            Outcome::Failure { error, block } => {
                assert_eq!(error, "Failed to fetch: connection reset by peer");
                assert!(block.ends_with("secs, Failed to fetch: connection reset by peer\n\n"));
                assert_eq!(block.lines().count(), 2);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_becomes_failure() {
        let formatter = RecordFormatter::new("Logs", vec!["missing".to_string()]);
        let outcome = unit().outcome(Ok(vec![Record::new().with("a", 1i64)]), &formatter);

        assert!(!outcome.is_success());
        assert!(outcome.block().contains("KeyNotFound"));
    }
}
