use chrono::Utc;
use clap::{Parser, builder::styling};
use eyre::Result;
use mds_extract::{cli, config::RunConfig, record::TIMESTAMP_FORMAT};
use owo_colors::OwoColorize;
use std::path::PathBuf;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// MDS Extract: pull time-sliced records from remote log tables, a few requests at a time
#[derive(Parser)]
#[command(name = "mdsx", version, styles = STYLES)]
struct Cli {
    /// JSON or JSON5 run configuration; every setting has a default except the query
    config: Option<PathBuf>,

    /// The dotenv file to source credentials from
    #[arg(short, long, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long)]
    debug: bool,

    /// Base URL of the data endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Source name or glob pattern (repeatable)
    #[arg(short, long = "source")]
    sources: Vec<String>,

    /// Filter predicate sent with every fetch
    #[arg(short, long)]
    query: Option<String>,

    /// Column to write, in order (repeatable; default is every column)
    #[arg(short, long = "column")]
    columns: Vec<String>,

    /// Start of the range (RFC 3339 or YYYY-MM-DDTHH:MM:SS, UTC)
    #[arg(long)]
    from: Option<String>,

    /// End of the range, exclusive
    #[arg(long)]
    to: Option<String>,

    /// Slice size, e.g. 00:15:00 or 15m
    #[arg(short, long)]
    interval: Option<String>,

    /// Maximum number of fetches in flight
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Directory receiving the per-source log files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> RunConfig {
        let non_empty = |values: &Vec<String>| (!values.is_empty()).then(|| values.clone());
        RunConfig {
            endpoint: self.endpoint.clone(),
            source_names: non_empty(&self.sources),
            query: self.query.clone(),
            column_names: non_empty(&self.columns),
            from: self.from.clone(),
            to: self.to.clone(),
            interval: self.interval.clone(),
            concurrency: self.concurrency,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match dotenvy::from_filename(&cli.env) {
        Err(e) if !e.not_found() => return Err(e.into()),
        _ => {}
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    let start = Utc::now();
    match &cli.config {
        Some(config) => log::info!(
            "Loading run configuration from {}",
            config.display().bright_black()
        ),
        None => log::info!("No run configuration given, using defaults"),
    }

    let result = cli::run_extraction(cli.config.as_deref(), cli.overrides()).await;

    let elapsed = (Utc::now() - start).to_std().unwrap_or_default();
    println!(
        "Start at {}, Elapsed = {:?}",
        start.format(TIMESTAMP_FORMAT),
        elapsed
    );

    result.map(|_| ())
}
