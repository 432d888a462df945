//! Opening the SQLite vehicle store named on the command line.

use camino::Utf8Path;
use plateypus_core::SqliteStore;

use crate::CliError;

/// Open the store at `path`, creating it and its directory when missing.
pub(crate) fn open_or_create(path: &Utf8Path) -> Result<SqliteStore, CliError> {
    plateypus_fs::ensure_parent_dir(path).map_err(|source| CliError::CreateDatabaseDir {
        path: path.to_path_buf(),
        source,
    })?;
    open(path)
}

/// Open an existing store; `field` names the flag that supplied `path`.
pub(crate) fn open_existing(path: &Utf8Path, field: &'static str) -> Result<SqliteStore, CliError> {
    require_existing(path, field)?;
    open(path)
}

pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match plateypus_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn open(path: &Utf8Path) -> Result<SqliteStore, CliError> {
    SqliteStore::open(path.as_std_path()).map_err(|source| CliError::OpenStore {
        path: path.to_path_buf(),
        source,
    })
}
