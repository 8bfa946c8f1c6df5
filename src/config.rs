//! Run configuration
//!
//! A run is described by an optional JSON/JSON5 document plus command-line
//! overrides. Both deserialize into [`RunConfig`]; merging and resolving
//! them yields the immutable [`RunParameters`] the scheduler consumes.

use crate::record::TIMESTAMP_FORMAT;
use crate::scheduler::TimeRange;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://production.diagnostics.monitoring.core.windows.net/";
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Tables queried when no source names are configured
pub const DEFAULT_SOURCES: &[&str] = &[
    "WAWSAntaresIISLogFrontEndTablePRODBAY013Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODBLU013Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODCH1003Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODHK1003Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODDB3007Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODAM2011Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODKW1001Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODOS1001Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODSG1001Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODCQ1001Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODML1001Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODSY3001Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODDM1001Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODBN1003Ver6v0",
    "WAWSAntaresIISLogFrontEndTablePRODSN1001Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODBAY013Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODBLU013Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODCH1003Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODHK1003Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODDB3007Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODAM2011Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODKW1001Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODOS1001Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODSG1001Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODCQ1001Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODML1001Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODSY3001Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODDM1001Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODBN1003Ver6v0",
    "WAWSAntaresIISLogWorkerTablePRODSN1001Ver6v0",
];

fn default_interval() -> TimeDelta {
    TimeDelta::minutes(15)
}

fn default_window() -> TimeDelta {
    TimeDelta::hours(1)
}

/// Unresolved run settings, as read from a document or the command line
///
/// Every field is optional. Legacy PascalCase field names are accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(alias = "MdsUri", alias = "mdsUri")]
    pub endpoint: Option<String>,
    #[serde(alias = "TableNames", alias = "tableNames")]
    pub source_names: Option<Vec<String>>,
    #[serde(alias = "Query")]
    pub query: Option<String>,
    #[serde(alias = "ColumnNames")]
    pub column_names: Option<Vec<String>>,
    #[serde(alias = "From")]
    pub from: Option<String>,
    #[serde(alias = "To")]
    pub to: Option<String>,
    #[serde(alias = "Interval")]
    pub interval: Option<String>,
    pub concurrency: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

impl RunConfig {
    /// Parse a JSON or JSON5 document
    pub fn parse(content: &str) -> Result<Self> {
        json5::from_str(content).context("Failed to parse run configuration")
    }

    /// Read a configuration document from disk
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Read `path` if given, otherwise start from an empty configuration
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => {
                log::debug!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Overlay `overrides` on top of this configuration
    pub fn merge(self, overrides: RunConfig) -> Self {
        Self {
            endpoint: overrides.endpoint.or(self.endpoint),
            source_names: overrides.source_names.or(self.source_names),
            query: overrides.query.or(self.query),
            column_names: overrides.column_names.or(self.column_names),
            from: overrides.from.or(self.from),
            to: overrides.to.or(self.to),
            interval: overrides.interval.or(self.interval),
            concurrency: overrides.concurrency.or(self.concurrency),
            output_dir: overrides.output_dir.or(self.output_dir),
        }
    }

    /// Apply defaults and validate, with `now` anchoring an open time range
    ///
    /// # Errors
    /// Returns an error for a missing query, an invalid endpoint, timestamp
    /// or interval, an inverted range, or a zero concurrency budget.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<RunParameters> {
        let endpoint = match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint,
            _ => DEFAULT_ENDPOINT,
        };
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid endpoint: {}", endpoint))?;

        let query = match self.query {
            Some(query) if !query.trim().is_empty() => query,
            _ => eyre::bail!("A query is required (set \"query\" in the config or pass --query)"),
        };

        let source_names = self
            .source_names
            .unwrap_or_else(|| DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect());

        let column_names = self.column_names.unwrap_or_default();

        let from = self.from.as_deref().map(parse_timestamp).transpose()?;
        let to = self.to.as_deref().map(parse_timestamp).transpose()?;
        let range = match (from, to) {
            (None, None) => TimeRange::new(now - default_window(), now),
            (None, Some(to)) => TimeRange::new(to - default_window(), to),
            (Some(from), None) => TimeRange::new(from, from + default_window()),
            (Some(from), Some(to)) => TimeRange::new(from, to),
        };
        if range.to < range.from {
            eyre::bail!("Time range is inverted: {}", range);
        }

        let interval = match self.interval.as_deref().map(str::trim) {
            Some(interval) if !interval.is_empty() => parse_interval(interval)?,
            _ => default_interval(),
        };

        let concurrency = self.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            eyre::bail!("Concurrency must be at least 1");
        }

        Ok(RunParameters {
            endpoint,
            source_names,
            query,
            column_names,
            range,
            interval,
            concurrency,
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

/// Fully resolved, immutable parameters of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub endpoint: Url,
    /// Literal names or glob patterns
    pub source_names: Vec<String>,
    pub query: String,
    /// Empty means every column
    pub column_names: Vec<String>,
    pub range: TimeRange,
    pub interval: TimeDelta,
    pub concurrency: usize,
    pub output_dir: PathBuf,
}

impl fmt::Display for RunParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Endpoint:    {}", self.endpoint)?;
        writeln!(f, "Sources:     {}", self.source_names.join(","))?;
        writeln!(f, "Query:       {}", self.query)?;
        writeln!(f, "Columns:     {}", self.column_names.join(","))?;
        writeln!(f, "From:        {}", self.range.from.format(TIMESTAMP_FORMAT))?;
        writeln!(f, "To:          {}", self.range.to.format(TIMESTAMP_FORMAT))?;
        writeln!(f, "Interval:    {}", format_interval(self.interval))?;
        write!(f, "Concurrency: {}", self.concurrency)
    }
}

/// Parse a UTC timestamp
///
/// Accepts RFC 3339 (any offset, converted to UTC) or a naive
/// `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`, which are
/// taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts.and_utc());
        }
    }
    Err(eyre!("Invalid timestamp: {}", value))
}

/// Parse a slice interval
///
/// Accepts `[d.]hh:mm[:ss[.fff]]` (e.g. `00:15:00`, `1.00:00:00`) or a
/// number followed by `s`, `m`, `h` or `d` (e.g. `90s`, `15m`).
pub fn parse_interval(value: &str) -> Result<TimeDelta> {
    let value = value.trim();
    let interval = if value.contains(':') {
        parse_clock_interval(value)
    } else {
        parse_unit_interval(value)
    }
    .with_context(|| format!("Invalid interval: {}", value))?;

    if interval <= TimeDelta::zero() {
        eyre::bail!("Interval must be positive: {}", value);
    }
    Ok(interval)
}

fn parse_clock_interval(value: &str) -> Result<TimeDelta> {
    let parts: Vec<&str> = value.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        eyre::bail!("Expected [d.]hh:mm[:ss]");
    }

    let (days, hours) = match parts[0].split_once('.') {
        Some((days, hours)) => (days.parse::<i64>()?, hours.parse::<i64>()?),
        None => (0, parts[0].parse::<i64>()?),
    };
    let minutes = parts[1].parse::<i64>()?;
    let seconds = match parts.get(2) {
        Some(seconds) => seconds.parse::<f64>()?,
        None => 0.0,
    };
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) || !(0.0..60.0).contains(&seconds)
    {
        eyre::bail!("Hours, minutes or seconds out of range");
    }

    let millis = (seconds * 1000.0).round() as i64;
    TimeDelta::try_days(days)
        .and_then(|total| total.checked_add(&TimeDelta::try_hours(hours)?))
        .and_then(|total| total.checked_add(&TimeDelta::try_minutes(minutes)?))
        .and_then(|total| total.checked_add(&TimeDelta::try_milliseconds(millis)?))
        .ok_or_else(|| eyre!("Interval too large"))
}

fn parse_unit_interval(value: &str) -> Result<TimeDelta> {
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| eyre!("Missing unit (use s, m, h or d)"))?;
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount
        .parse()
        .map_err(|_| eyre!("Missing amount before unit"))?;
    let interval = match unit.trim() {
        "s" => TimeDelta::try_seconds(amount),
        "m" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        "d" => TimeDelta::try_days(amount),
        other => eyre::bail!("Unknown unit '{}'", other),
    };
    interval.ok_or_else(|| eyre!("Interval too large"))
}

/// Render an interval as `[d.]hh:mm:ss`
pub fn format_interval(interval: TimeDelta) -> String {
    let total = interval.num_seconds();
    let (days, rest) = (total / 86_400, total % 86_400);
    let clock = format!("{:02}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    if days > 0 {
        format!("{}.{}", days, clock)
    } else {
        clock
    }
}
