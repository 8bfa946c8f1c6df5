//! CLI helper functions

use crate::{
    client::{Auth, MdsClient},
    config::{RunConfig, RunParameters},
    scheduler::{RunSummary, Scheduler},
    storage::OutcomeSink,
};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use url::Url;

/// Build the HTTP data client for `endpoint`
///
/// Credentials come from the environment:
/// - MDS_APIKEY: API key (optional, wins over username/password)
/// - MDS_USERNAME / MDS_PASSWORD: Basic auth (optional)
pub fn load_data_client(endpoint: &Url) -> Result<MdsClient> {
    let auth = Auth::from_env();
    log::debug!("Using {} authentication", auth);
    MdsClient::try_new(endpoint.clone(), auth).context("Failed to create data client")
}

/// Read the config document (if any), apply overrides and resolve defaults
///
/// Every configuration problem surfaces here, before anything is dispatched.
pub fn resolve_parameters(
    config_path: Option<&Path>,
    overrides: RunConfig,
) -> Result<RunParameters> {
    let config = RunConfig::load(config_path)?.merge(overrides);
    config.resolve(chrono::Utc::now())
}

/// Run a full extraction
///
/// Steps: resolve parameters → print them → build client and sink →
/// expand, dispatch and drain.
pub async fn run_extraction(
    config_path: Option<&Path>,
    overrides: RunConfig,
) -> Result<RunSummary> {
    let params = resolve_parameters(config_path, overrides)?;
    println!("{}", params);

    let client = load_data_client(&params.endpoint)?;
    let sink = OutcomeSink::with_random_suffix(&params.output_dir);
    log::info!(
        "Writing outcomes to {}",
        sink.destination("<source>").display().bright_black()
    );

    let summary = Scheduler::new(client, params, sink).run().await?;

    if summary.failed > 0 {
        log::warn!(
            "{} of {} unit(s) failed",
            summary.failed.red(),
            summary.dispatched
        );
    } else {
        log::info!(
            "✓ Extracted {} record(s) in {} unit(s)",
            summary.records.green(),
            summary.dispatched
        );
    }

    Ok(summary)
}
