use std::io;
use std::path::PathBuf;

use clap::Parser;
use fuel_cleaner::config::{AppConfig, PathsConfig};
use fuel_cleaner::error::AppError;
use fuel_cleaner::telemetry;
use fuel_cleaner::workflows::cleaning::RowCleaner;
use fuel_cleaner::workflows::zip_lookup::{LookupBudget, ZipResolver};
use tracing::info;

use crate::summary;

#[derive(Parser, Debug)]
#[command(
    name = "fuel-cleaner",
    about = "Deduplicate and normalize a fuel purchase export into cleaned and anomaly CSVs",
    version
)]
pub(crate) struct Cli {
    /// Input CSV (defaults to FUEL_INPUT_PATH)
    #[arg(long)]
    pub(crate) input: Option<PathBuf>,
    /// Destination for cleaned rows (defaults to FUEL_CLEANED_PATH)
    #[arg(long)]
    pub(crate) cleaned: Option<PathBuf>,
    /// Destination for anomaly rows (defaults to FUEL_ANOMALIES_PATH)
    #[arg(long)]
    pub(crate) anomalies: Option<PathBuf>,
    /// Skip the geocoding map build; missing ZIPs become 00000
    #[arg(long)]
    pub(crate) offline: bool,
    /// Print the run report as JSON instead of a text summary
    #[arg(long)]
    pub(crate) json: bool,
}

impl Cli {
    fn apply_overrides(&mut self, paths: &mut PathsConfig) {
        if let Some(input) = self.input.take() {
            paths.input = input;
        }
        if let Some(cleaned) = self.cleaned.take() {
            paths.cleaned = cleaned;
        }
        if let Some(anomalies) = self.anomalies.take() {
            paths.anomalies = anomalies;
        }
    }
}

pub(crate) fn run() -> Result<(), AppError> {
    let mut cli = Cli::parse();
    let mut config = AppConfig::load()?;
    cli.apply_overrides(&mut config.paths);

    telemetry::init(&config.telemetry)?;
    info!(environment = ?config.environment, offline = cli.offline, "fuel purchase cleaner starting");

    let resolver = if cli.offline {
        ZipResolver::offline(LookupBudget::new(config.cleaning.lookup_budget))
    } else {
        ZipResolver::from_config(&config.geocoding, &config.cleaning)
    };

    let mut cleaner = RowCleaner::new(resolver, &config.cleaning);
    let report = cleaner.run(&config.paths)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.json {
        summary::write_json(&mut out, &report)?;
    } else {
        summary::write_text(&mut out, &report)?;
    }
    Ok(())
}
