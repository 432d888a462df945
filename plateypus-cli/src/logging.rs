//! Process-wide log output.
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! also captures those records.

use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::{ARG_LOG_LEVEL, ARG_LOG_OUTPUT, CliError};

pub(crate) const DEFAULT_LOG_LEVEL: &str = "warn";
pub(crate) const ENV_LOG_LEVEL: &str = "PLATEYPUS_LOG_LEVEL";
pub(crate) const ENV_LOG_OUTPUT: &str = "PLATEYPUS_LOG_OUTPUT";
const ENV_RUST_LOG: &str = "RUST_LOG";

/// Logging flags shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct LoggingArgs {
    /// Log filter, e.g. `info` or `plateypus_data=debug`.
    #[arg(long = ARG_LOG_LEVEL, value_name = "filter", global = true)]
    pub(crate) log_level: Option<String>,
    /// Also append log output to this file.
    #[arg(long = ARG_LOG_OUTPUT, value_name = "path", global = true)]
    pub(crate) log_output: Option<Utf8PathBuf>,
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoggingConfig {
    pub(crate) filter: String,
    pub(crate) output: Option<Utf8PathBuf>,
}

impl LoggingArgs {
    /// Apply environment fallbacks: flags win over `PLATEYPUS_LOG_LEVEL`,
    /// which wins over `RUST_LOG`.
    pub(crate) fn resolve(self, env: impl Fn(&str) -> Option<String>) -> LoggingConfig {
        let filter = self
            .log_level
            .or_else(|| env(ENV_LOG_LEVEL))
            .or_else(|| env(ENV_RUST_LOG))
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned());
        let output = self
            .log_output
            .or_else(|| env(ENV_LOG_OUTPUT).map(Utf8PathBuf::from));
        LoggingConfig { filter, output }
    }
}

pub(crate) fn build_filter(directive: &str) -> Result<EnvFilter, CliError> {
    EnvFilter::try_new(directive).map_err(|source| CliError::InvalidLogFilter {
        filter: directive.to_owned(),
        source,
    })
}

/// Install the global subscriber writing to stderr and, optionally, a file.
pub(crate) fn init(args: LoggingArgs) -> Result<(), CliError> {
    let config = args.resolve(|key| std::env::var(key).ok());
    let filter = build_filter(&config.filter)?;
    let file_layer = config
        .output
        .as_deref()
        .map(open_output)
        .transpose()?
        .map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        });
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(CliError::InstallLogger)
}

fn open_output(path: &Utf8Path) -> Result<cap_std::fs_utf8::File, CliError> {
    plateypus_fs::append_file(path).map_err(|source| CliError::OpenLogOutput {
        path: path.to_owned(),
        source,
    })
}
