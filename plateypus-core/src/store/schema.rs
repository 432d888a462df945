//! Schema bootstrap for the SQLite vehicle store.

use rusqlite::{Connection, OptionalExtension, Transaction};

use super::StoreError;

/// Version of the vehicle store layout written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Create the vehicle and watermark tables inside `connection`.
///
/// All steps run in one transaction and are idempotent. A database recording
/// a different schema version is rejected so migrations can be applied
/// explicitly.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use plateypus_core::store::{SCHEMA_VERSION, initialise_schema};
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create vehicle schema");
/// initialise_schema(&mut conn).expect("schema creation is idempotent");
///
/// let version: i64 = conn
///     .query_row("SELECT version FROM plateypus_schema_version", [], |row| row.get(0))
///     .expect("read schema version");
/// assert_eq!(version, SCHEMA_VERSION);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let transaction = connection
        .transaction()
        .map_err(|source| StoreError::Sqlite {
            operation: "begin schema transaction",
            source,
        })?;

    create_tables(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction.commit().map_err(|source| StoreError::Sqlite {
        operation: "commit schema transaction",
        source,
    })
}

fn create_tables(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_migration_step(
        transaction,
        "create vehicles",
        "CREATE TABLE IF NOT EXISTS vehicles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            country TEXT NOT NULL CHECK (length(country) = 2),
            plate TEXT NOT NULL,
            first_reg TEXT NOT NULL,
            vin TEXT NOT NULL,
            maker TEXT NOT NULL,
            model TEXT NOT NULL,
            fuel_type TEXT NOT NULL,
            colour TEXT NOT NULL,
            raw_xml TEXT NOT NULL
        )",
    )?;
    run_migration_step(
        transaction,
        "index vehicles by country",
        "CREATE INDEX IF NOT EXISTS idx_vehicles_country ON vehicles(country)",
    )?;
    run_migration_step(
        transaction,
        "create metadata",
        "CREATE TABLE IF NOT EXISTS metadata (
            country TEXT PRIMARY KEY CHECK (length(country) = 2),
            last_updated TEXT NOT NULL
        ) WITHOUT ROWID",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), StoreError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS plateypus_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing: Option<i64> = transaction
        .query_row(
            "SELECT version FROM plateypus_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| StoreError::Sqlite {
            operation: "read schema version",
            source,
        })?;

    match existing {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(StoreError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO plateypus_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| StoreError::Sqlite {
                operation: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), StoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| StoreError::Sqlite {
            operation: step,
            source,
        })
}
