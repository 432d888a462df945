//! Vehicle lookup command implementation for the Plateypus CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use plateypus_core::{StoredVehicle, get_vehicle};
use serde::{Deserialize, Serialize};

use crate::search::write_json;
use crate::{ARG_DATABASE, ARG_VEHICLE_ID, CliError, ENV_VEHICLE_DATABASE, ENV_VEHICLE_ID, store};

/// CLI arguments for the `vehicle` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Print one stored vehicle as JSON")]
#[ortho_config(prefix = "PLATEYPUS")]
pub(crate) struct VehicleArgs {
    /// Identifier assigned by the store.
    #[arg(value_name = "id")]
    #[serde(default)]
    pub(crate) id: Option<String>,
    /// Path to the SQLite vehicle store.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl VehicleArgs {
    pub(crate) fn into_config(self) -> Result<VehicleConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        VehicleConfig::try_from(merged)
    }
}

/// Resolved `vehicle` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VehicleConfig {
    pub(crate) id: String,
    pub(crate) database: Utf8PathBuf,
}

impl TryFrom<VehicleArgs> for VehicleConfig {
    type Error = CliError;

    fn try_from(args: VehicleArgs) -> Result<Self, Self::Error> {
        let id = args.id.ok_or(CliError::MissingArgument {
            field: ARG_VEHICLE_ID,
            env: ENV_VEHICLE_ID,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_VEHICLE_DATABASE,
        })?;
        Ok(Self { id, database })
    }
}

pub(super) fn run_vehicle(args: VehicleArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let vehicle = execute_lookup(&config)?;
    write_json(writer, &vehicle)
}

pub(super) fn execute_lookup(config: &VehicleConfig) -> Result<StoredVehicle, CliError> {
    let vehicles = store::open_existing(&config.database, ARG_DATABASE)?;
    Ok(get_vehicle(&vehicles, &config.id)?)
}
