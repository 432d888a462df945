//! Command-line interface for the Plateypus vehicle index.
//!
//! `sync` runs one incremental synchronisation of a national register into a
//! SQLite store; `search` and `vehicle` read that store back.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod logging;
mod lookup;
mod search;
mod store;
mod sync;

pub use error::CliError;

use logging::LoggingArgs;
use lookup::VehicleArgs;
use search::SearchArgs;
use sync::SyncArgs;

const ARG_COUNTRY: &str = "country";
const ARG_DATABASE: &str = "database";
const ARG_DOWNLOAD_DIR: &str = "download-dir";
const ARG_METADATA_URL: &str = "metadata-url";
const ARG_KEEP_ARCHIVE: &str = "keep-archive";
const ARG_SEARCH_REQUEST: &str = "request";
const ARG_VEHICLE_ID: &str = "id";
const ARG_LOG_LEVEL: &str = "log-level";
const ARG_LOG_OUTPUT: &str = "log-output";
const ENV_SYNC_DATABASE: &str = "PLATEYPUS_CMDS_SYNC_DATABASE";
const ENV_SEARCH_DATABASE: &str = "PLATEYPUS_CMDS_SEARCH_DATABASE";
const ENV_SEARCH_REQUEST: &str = "PLATEYPUS_CMDS_SEARCH_REQUEST";
const ENV_VEHICLE_DATABASE: &str = "PLATEYPUS_CMDS_VEHICLE_DATABASE";
const ENV_VEHICLE_ID: &str = "PLATEYPUS_CMDS_VEHICLE_ID";

/// Run the Plateypus CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    logging::init(cli.logging)?;
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Sync(args) => sync::run_sync(args, &mut stdout).map(|_| ()),
        Command::Search(args) => search::run_search(args, &mut stdout),
        Command::Vehicle(args) => lookup::run_vehicle(args, &mut stdout),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "plateypus",
    about = "Synchronise and search national vehicle registers",
    version
)]
struct Cli {
    #[command(flatten)]
    logging: LoggingArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the newest register dump if it is newer than the stored one.
    Sync(SyncArgs),
    /// Run a fuzzy multi-field search against the store.
    Search(SearchArgs),
    /// Print one stored vehicle by identifier.
    Vehicle(VehicleArgs),
}

#[cfg(test)]
mod tests;
