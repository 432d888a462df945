//! Search command implementation for the Plateypus CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use plateypus_core::VehicleStore;
use plateypus_core::search::{SearchHit, SearchRequest, VehicleQuery};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_SEARCH_REQUEST, CliError, ENV_SEARCH_DATABASE, ENV_SEARCH_REQUEST, store,
};

/// CLI arguments for the `search` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Search stored vehicles with a JSON request such as \
                 '{\"fields\": {\"country\": \"dk\", \"maker\": \"audi\"}}'. \
                 Country matches exactly, plate tolerates up to two edits \
                 and other fields match fuzzily. Hits are printed as JSON, \
                 best first.",
    about = "Search stored vehicles"
)]
#[ortho_config(prefix = "PLATEYPUS")]
pub(crate) struct SearchArgs {
    /// JSON search request.
    #[arg(value_name = "json")]
    #[serde(default)]
    pub(crate) request: Option<String>,
    /// Path to the SQLite vehicle store.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl SearchArgs {
    pub(crate) fn into_config(self) -> Result<SearchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SearchConfig::try_from(merged)
    }
}

/// Resolved `search` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchConfig {
    pub(crate) request: String,
    pub(crate) database: Utf8PathBuf,
}

impl TryFrom<SearchArgs> for SearchConfig {
    type Error = CliError;

    fn try_from(args: SearchArgs) -> Result<Self, Self::Error> {
        let request = args.request.ok_or(CliError::MissingArgument {
            field: ARG_SEARCH_REQUEST,
            env: ENV_SEARCH_REQUEST,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_SEARCH_DATABASE,
        })?;
        Ok(Self { request, database })
    }
}

pub(super) fn run_search(args: SearchArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let hits = execute_search(&config)?;
    write_json(writer, &hits)
}

/// Validate the request before touching the store, then rank matches.
pub(super) fn execute_search(config: &SearchConfig) -> Result<Vec<SearchHit>, CliError> {
    let request = SearchRequest::parse(&config.request)?;
    let query = VehicleQuery::from_request(&request);
    log::debug!("search query: {}", query.to_json());
    let vehicles = store::open_existing(&config.database, ARG_DATABASE)?;
    vehicles
        .search(&query, request.size())
        .map_err(|source| CliError::Search {
            path: config.database.clone(),
            source,
        })
}

pub(super) fn write_json<T: Serialize + ?Sized>(
    writer: &mut dyn Write,
    value: &T,
) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
