//! Error types emitted by the Plateypus CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use plateypus_core::search::SearchRequestError;
use plateypus_core::{CountryCodeError, LookupError, StoreError};
use plateypus_data::etl::SyncError;
use plateypus_data::remote::DiscoveryError;
use thiserror::Error;

/// Errors emitted by the Plateypus CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The requested country code is malformed.
    #[error("invalid --country: {0}")]
    InvalidCountry(#[source] CountryCodeError),
    /// A referenced input path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The directory holding the database could not be created.
    #[error("failed to create the directory for {path:?}: {source}")]
    CreateDatabaseDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The vehicle store could not be opened.
    #[error("failed to open vehicle store {path:?}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: StoreError,
    },
    /// Querying the vehicle store failed.
    #[error("failed to search vehicle store {path:?}: {source}")]
    Search {
        path: Utf8PathBuf,
        #[source]
        source: StoreError,
    },
    /// The search request was rejected.
    #[error(transparent)]
    InvalidSearchRequest(#[from] SearchRequestError),
    /// The requested vehicle could not be returned.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The discovery client could not be built.
    #[error("failed to prepare register discovery: {0}")]
    Discovery(#[from] DiscoveryError),
    /// The async runtime could not be started.
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The synchronisation run failed.
    #[error("synchronisation failed: {0}")]
    Sync(#[from] SyncError),
    /// The log filter directive is invalid.
    #[error("invalid log filter {filter:?}: {source}")]
    InvalidLogFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// The log output file could not be opened.
    #[error("failed to open log output {path:?}: {source}")]
    OpenLogOutput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A global logger was already installed.
    #[error("failed to install logger: {0}")]
    InstallLogger(#[source] tracing_subscriber::util::TryInitError),
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
