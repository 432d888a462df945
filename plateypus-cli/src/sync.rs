//! Sync command implementation for the Plateypus CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use plateypus_core::CountryCode;
use plateypus_data::etl::{SyncOutcome, SyncPipeline, SyncSettings};
use plateypus_data::remote::{
    DEFAULT_METADATA_URL, DiscoveryClient, FtpConnector, HttpDiscoveryClient, RemoteConnector,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_COUNTRY, ARG_DATABASE, ARG_DOWNLOAD_DIR, ARG_KEEP_ARCHIVE, ARG_METADATA_URL, CliError,
    ENV_SYNC_DATABASE, store,
};

pub(crate) const DEFAULT_COUNTRY: &str = "dk";

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Download the newest dump of a national vehicle register and \
                 replace that country's vehicles in the store. Nothing is \
                 downloaded when the store already holds the newest dump.",
    about = "Synchronise a national vehicle register"
)]
#[ortho_config(prefix = "PLATEYPUS")]
pub(crate) struct SyncArgs {
    /// Two-letter code of the register to synchronise (default `dk`).
    #[arg(long = ARG_COUNTRY, value_name = "code")]
    #[serde(default)]
    pub(crate) country: Option<String>,
    /// Path to the SQLite vehicle store; created when missing.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Directory the dump is downloaded into (default: system temp dir).
    #[arg(long = ARG_DOWNLOAD_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) download_dir: Option<Utf8PathBuf>,
    /// Catalog URL advertising the register's FTP location.
    #[arg(long = ARG_METADATA_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) metadata_url: Option<String>,
    /// Keep the downloaded archive after the run.
    #[arg(long = ARG_KEEP_ARCHIVE)]
    #[serde(default, skip_serializing_if = "is_false")]
    pub(crate) keep_archive: bool,
}

const fn is_false(value: &bool) -> bool {
    !*value
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncConfig::try_from(merged)
    }
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncConfig {
    pub(crate) country: CountryCode,
    pub(crate) database: Utf8PathBuf,
    pub(crate) download_dir: Utf8PathBuf,
    pub(crate) metadata_url: String,
    pub(crate) keep_archive: bool,
}

impl SyncConfig {
    fn settings(&self) -> SyncSettings {
        SyncSettings {
            country: self.country.clone(),
            download_dir: self.download_dir.clone(),
            keep_archive: self.keep_archive,
        }
    }
}

impl TryFrom<SyncArgs> for SyncConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        let country = CountryCode::new(args.country.as_deref().unwrap_or(DEFAULT_COUNTRY))
            .map_err(CliError::InvalidCountry)?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_SYNC_DATABASE,
        })?;
        let download_dir = args
            .download_dir
            .unwrap_or_else(|| SyncSettings::new(country.clone()).download_dir);
        let metadata_url = args
            .metadata_url
            .unwrap_or_else(|| DEFAULT_METADATA_URL.to_owned());
        Ok(Self {
            country,
            database,
            download_dir,
            metadata_url,
            keep_archive: args.keep_archive,
        })
    }
}

pub(super) fn run_sync(args: SyncArgs, writer: &mut dyn Write) -> Result<SyncOutcome, CliError> {
    let config = args.into_config()?;
    let discovery = HttpDiscoveryClient::new(config.metadata_url.clone())?;
    run_sync_with(&config, discovery, FtpConnector, writer)
}

/// Run one synchronisation with explicit remote collaborators and report
/// the outcome on `writer`.
pub(super) fn run_sync_with<Q, C>(
    config: &SyncConfig,
    discovery: Q,
    connector: C,
    writer: &mut dyn Write,
) -> Result<SyncOutcome, CliError>
where
    Q: DiscoveryClient,
    C: RemoteConnector,
{
    let mut vehicles = store::open_or_create(&config.database)?;
    let pipeline = SyncPipeline::new(discovery, connector, config.settings());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let outcome = runtime.block_on(pipeline.extract_transform_load(&mut vehicles))?;
    write_summary(writer, &config.country, &outcome)?;
    Ok(outcome)
}

fn write_summary(
    writer: &mut dyn Write,
    country: &CountryCode,
    outcome: &SyncOutcome,
) -> Result<(), CliError> {
    match outcome {
        SyncOutcome::NoNewerFile => writeln!(writer, "{country}: no newer file"),
        SyncOutcome::NoEntities => writeln!(
            writer,
            "{country}: newest dump held no vehicles; existing data kept"
        ),
        SyncOutcome::Loaded {
            deleted,
            inserted,
            timestamp,
        } => writeln!(
            writer,
            "{country}: replaced {deleted} vehicles with {inserted} (dump of {timestamp})"
        ),
    }
    .map_err(CliError::WriteOutput)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SyncConfig, CliError> {
    let merged = SyncArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SyncConfig::try_from(merged)
}
