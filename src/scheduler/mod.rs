//! Bounded-concurrency extraction scheduler
//!
//! A run goes through four phases:
//! 1. **Expanding**: source patterns are resolved and the time range is sliced
//! 2. **Dispatching**: one unit per (slice, source), each waiting for a permit
//! 3. **Draining**: wait until every dispatched unit has completed
//! 4. **Done**: return a [`RunSummary`]
//!
//! The permit pool bounds how many units are in flight. The dispatch loop
//! blocks when it is exhausted, so slow sources throttle dispatch.

mod slices;
mod sources;
mod tracker;
mod unit;

pub use slices::TimeRange;
pub use sources::{SourceResolver, SourceSpec, glob_to_regex};
pub use tracker::{InFlight, Outstanding, Tracked};
pub use unit::{ExtractionUnit, Outcome};

use crate::client::DataClient;
use crate::config::RunParameters;
use crate::etl::Extractor;
use crate::record::Record;
use crate::storage::OutcomeSink;
use crate::transform::RecordFormatter;
use eyre::{Result, eyre};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Concrete sources after wildcard expansion
    pub sources: usize,
    pub slices: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records written across all successful units
    pub records: usize,
}

#[derive(Debug, Default)]
struct Stats {
    dispatched: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    records: AtomicUsize,
}

/// Coordinator fanning extraction units out over a fixed permit pool
///
/// # Example
/// ```no_run
/// use mds_extract::client::{Auth, MdsClient};
/// use mds_extract::config::RunConfig;
/// use mds_extract::scheduler::Scheduler;
/// use mds_extract::storage::OutcomeSink;
///
/// # async fn example() -> eyre::Result<()> {
/// let config = RunConfig {
///     query: Some("Sc_status = 400".to_string()),
///     ..Default::default()
/// };
/// let params = config.resolve(chrono::Utc::now())?;
/// let client = MdsClient::try_new(params.endpoint.clone(), Auth::None)?;
/// let sink = OutcomeSink::with_random_suffix(&params.output_dir);
///
/// let summary = Scheduler::new(client, params, sink).run().await?;
/// println!("{} unit(s) failed", summary.failed);
/// # Ok(())
/// # }
/// ```
pub struct Scheduler<C> {
    client: Arc<C>,
    params: Arc<RunParameters>,
    sink: Arc<OutcomeSink>,
    permits: Arc<Semaphore>,
    outstanding: Arc<Outstanding>,
    stats: Arc<Stats>,
    started: AtomicBool,
}

impl<C: DataClient> Scheduler<C> {
    pub fn new(client: C, params: RunParameters, sink: OutcomeSink) -> Self {
        let permits = Arc::new(Semaphore::new(params.concurrency));
        Self {
            client: Arc::new(client),
            params: Arc::new(params),
            sink: Arc::new(sink),
            permits,
            outstanding: Arc::new(Outstanding::new()),
            stats: Arc::new(Stats::default()),
            started: AtomicBool::new(false),
        }
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    pub fn sink(&self) -> &OutcomeSink {
        &self.sink
    }

    /// Outstanding-unit tracker for this run
    pub fn outstanding(&self) -> &Outstanding {
        &self.outstanding
    }

    /// Execute the run and wait for every unit to complete
    ///
    /// # Errors
    /// Only expansion can fail the run: an invalid source spec, a failed
    /// wildcard listing or an invalid interval. Nothing has been dispatched
    /// at that point. Unit failures are written to the sink and counted in
    /// the summary instead.
    ///
    /// A scheduler runs once. Any later call fails without dispatching.
    pub async fn run(&self) -> Result<RunSummary> {
        if self.started.swap(true, Ordering::AcqRel) {
            eyre::bail!("Scheduler has already run");
        }

        // Expanding
        let specs = self
            .params
            .source_names
            .iter()
            .map(|name| SourceSpec::parse(name))
            .collect::<Result<Vec<_>>>()?;
        let sources = SourceResolver::new(self.client.as_ref(), &specs)
            .extract()
            .await?;
        let slices = self.params.range.slices(self.params.interval)?;

        log::info!(
            "Dispatching {} unit(s): {} source(s) x {} slice(s), {} in flight at most",
            sources.len() * slices.len(),
            sources.len(),
            slices.len(),
            self.params.concurrency
        );

        // Dispatching. The loop holds its own share of the outstanding count
        // so it cannot reach zero before the last unit has been offered.
        let columns: Arc<[String]> = self.params.column_names.clone().into();
        let hold = self.outstanding.track();
        for slice in &slices {
            for source in &sources {
                let permit = self
                    .permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| eyre!("Concurrency pool closed during dispatch"))?;
                let in_flight = InFlight::new(permit, self.outstanding.track());
                let unit = ExtractionUnit::new(source.clone(), *slice);
                let formatter = RecordFormatter::new(source.clone(), columns.clone());
                self.dispatch(unit, formatter, in_flight);
            }
        }
        drop(hold);

        // Draining
        log::debug!("All units dispatched, waiting for completion");
        self.outstanding.wait_idle().await;

        let summary = RunSummary {
            sources: sources.len(),
            slices: slices.len(),
            dispatched: self.stats.dispatched.load(Ordering::Acquire),
            succeeded: self.stats.succeeded.load(Ordering::Acquire),
            failed: self.stats.failed.load(Ordering::Acquire),
            records: self.stats.records.load(Ordering::Acquire),
        };
        log::info!(
            "Run complete: {} succeeded, {} failed, {} record(s)",
            summary.succeeded,
            summary.failed,
            summary.records
        );
        Ok(summary)
    }

    /// Start one unit; its completion is routed exactly once
    fn dispatch(&self, unit: ExtractionUnit, formatter: RecordFormatter, in_flight: InFlight) {
        self.stats.dispatched.fetch_add(1, Ordering::AcqRel);
        log::debug!("Dispatching {} {}", unit.source(), unit.range());

        match self.client.fetch(&unit.request(&self.params.query)) {
            Ok(pending) => {
                let sink = self.sink.clone();
                let stats = self.stats.clone();
                tokio::spawn(async move {
                    let result = pending.await;
                    complete(&sink, &stats, &unit, &formatter, result);
                    drop(in_flight);
                });
            }
            Err(error) => {
                // The fetch never started: report it and free the permit now
                complete(&self.sink, &self.stats, &unit, &formatter, Err(error));
                drop(in_flight);
            }
        }
    }
}

fn complete(
    sink: &OutcomeSink,
    stats: &Stats,
    unit: &ExtractionUnit,
    formatter: &RecordFormatter,
    result: Result<Vec<Record>>,
) {
    let outcome = unit.outcome(result, formatter);
    match &outcome {
        Outcome::Success { records, .. } => {
            log::debug!("{} {}: {} record(s)", unit.source(), unit.range(), records)
        }
        Outcome::Failure { error, .. } => {
            log::warn!("{} {} failed: {}", unit.source(), unit.range(), error)
        }
    }

    if let Err(error) = sink.write(unit.source(), outcome.block()) {
        log::error!("Failed to write outcome for {}: {:#}", unit.source(), error);
        stats.failed.fetch_add(1, Ordering::AcqRel);
        return;
    }

    match outcome {
        Outcome::Success { records, .. } => {
            stats.succeeded.fetch_add(1, Ordering::AcqRel);
            stats.records.fetch_add(records, Ordering::AcqRel);
        }
        Outcome::Failure { .. } => {
            stats.failed.fetch_add(1, Ordering::AcqRel);
        }
    }
}
