//! SQLite-backed vehicle and watermark store.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use super::{StoreError, VehicleStore, WatermarkStore, schema::initialise_schema};
use crate::search::{SearchHit, TopHits, VehicleQuery};
use crate::{CountryCode, StoredVehicle, Vehicle, VehicleId};

const VEHICLE_COLUMNS: &str =
    "id, country, plate, first_reg, vin, maker, model, fuel_type, colour, raw_xml";
/// Columns scored by a search; the raw markup is fetched for hits only.
const SCAN_COLUMNS: &str =
    "id, country, plate, first_reg, vin, maker, model, fuel_type, colour, '' AS raw_xml";

/// Vehicle documents and watermarks persisted in a single SQLite database.
///
/// Replacing a country's partition runs inside one transaction, so readers
/// never observe the gap between deletion and re-insertion.
pub struct SqliteStore {
    connection: Connection,
    location: Option<PathBuf>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if necessary) the store at `path`.
    ///
    /// The parent directory must already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(connection, Some(path.to_path_buf()))
    }

    /// Open a private, non-persistent store.
    ///
    /// # Examples
    /// ```
    /// use plateypus_core::store::{SqliteStore, WatermarkStore};
    /// use plateypus_core::CountryCode;
    ///
    /// let store = SqliteStore::open_in_memory().expect("open store");
    /// assert_eq!(store.watermark(&CountryCode::denmark()).expect("read"), None);
    /// ```
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(connection, None)
    }

    fn from_connection(
        mut connection: Connection,
        location: Option<PathBuf>,
    ) -> Result<Self, StoreError> {
        initialise_schema(&mut connection)?;
        Ok(Self {
            connection,
            location,
        })
    }

    /// Number of vehicles stored for `country`.
    pub fn count(&self, country: &CountryCode) -> Result<u64, StoreError> {
        let count: i64 = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM vehicles WHERE country = ?1",
                [country.as_str()],
                |row| row.get(0),
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "count vehicles",
                source,
            })?;
        u64::try_from(count).map_err(|_| StoreError::Corrupt {
            what: "vehicle count",
            detail: format!("negative count {count}"),
        })
    }

    fn raw_xml(&self, id: VehicleId) -> Result<String, StoreError> {
        self.connection
            .query_row(
                "SELECT raw_xml FROM vehicles WHERE id = ?1",
                [id.get()],
                |row| row.get(0),
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "fetch raw markup",
                source,
            })
    }

    fn begin(&mut self) -> Result<Transaction<'_>, StoreError> {
        self.connection
            .transaction()
            .map_err(|source| StoreError::Sqlite {
                operation: "begin transaction",
                source,
            })
    }
}

fn delete_in(transaction: &Transaction<'_>, country: &CountryCode) -> Result<u64, StoreError> {
    let deleted = transaction
        .execute("DELETE FROM vehicles WHERE country = ?1", [country.as_str()])
        .map_err(|source| StoreError::Sqlite {
            operation: "delete vehicles",
            source,
        })?;
    u64::try_from(deleted).map_err(|_| StoreError::OutOfRange {
        what: "deleted vehicle",
        count: deleted,
    })
}

fn insert_in(transaction: &Transaction<'_>, vehicles: &[Vehicle]) -> Result<u64, StoreError> {
    let mut insert = transaction
        .prepare_cached(
            "INSERT INTO vehicles (
                country, plate, first_reg, vin, maker, model, fuel_type, colour, raw_xml
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .map_err(|source| StoreError::Sqlite {
            operation: "prepare insert vehicle",
            source,
        })?;
    for vehicle in vehicles {
        insert
            .execute(params![
                vehicle.country.as_str(),
                vehicle.plate,
                vehicle.first_reg,
                vehicle.vin,
                vehicle.maker,
                vehicle.model,
                vehicle.fuel_type,
                vehicle.colour,
                vehicle.raw_xml,
            ])
            .map_err(|source| StoreError::Sqlite {
                operation: "insert vehicle",
                source,
            })?;
    }
    u64::try_from(vehicles.len()).map_err(|_| StoreError::OutOfRange {
        what: "inserted vehicle",
        count: vehicles.len(),
    })
}

fn commit(transaction: Transaction<'_>) -> Result<(), StoreError> {
    transaction.commit().map_err(|source| StoreError::Sqlite {
        operation: "commit transaction",
        source,
    })
}

type VehicleRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
);

fn read_row(row: &Row<'_>) -> rusqlite::Result<VehicleRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn decode_row(row: VehicleRow) -> Result<StoredVehicle, StoreError> {
    let (id, country, plate, first_reg, vin, maker, model, fuel_type, colour, raw_xml) = row;
    let country = CountryCode::new(&country).map_err(|err| StoreError::Corrupt {
        what: "vehicle country",
        detail: err.to_string(),
    })?;
    Ok(StoredVehicle {
        id: VehicleId::new(id),
        vehicle: Vehicle {
            country,
            plate,
            first_reg,
            vin,
            maker,
            model,
            fuel_type,
            colour,
            raw_xml,
        },
    })
}

impl VehicleStore for SqliteStore {
    fn delete_country(&mut self, country: &CountryCode) -> Result<u64, StoreError> {
        let transaction = self.begin()?;
        let deleted = delete_in(&transaction, country)?;
        commit(transaction)?;
        Ok(deleted)
    }

    fn insert_vehicles(&mut self, vehicles: &[Vehicle]) -> Result<u64, StoreError> {
        let transaction = self.begin()?;
        let inserted = insert_in(&transaction, vehicles)?;
        commit(transaction)?;
        Ok(inserted)
    }

    fn replace_country(
        &mut self,
        country: &CountryCode,
        vehicles: &[Vehicle],
    ) -> Result<(u64, u64), StoreError> {
        let transaction = self.begin()?;
        let deleted = delete_in(&transaction, country)?;
        let inserted = insert_in(&transaction, vehicles)?;
        commit(transaction)?;
        Ok((deleted, inserted))
    }

    fn get_vehicle(&self, id: VehicleId) -> Result<Option<StoredVehicle>, StoreError> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1");
        let row = self
            .connection
            .query_row(&sql, [id.get()], read_row)
            .optional()
            .map_err(|source| StoreError::Sqlite {
                operation: "fetch vehicle",
                source,
            })?;
        row.map(decode_row).transpose()
    }

    fn search(&self, query: &VehicleQuery, size: usize) -> Result<Vec<SearchHit>, StoreError> {
        let sql = match query.country_filter() {
            Some(_) => format!("SELECT {SCAN_COLUMNS} FROM vehicles WHERE country = ?1"),
            None => format!("SELECT {SCAN_COLUMNS} FROM vehicles"),
        };
        let mut top = TopHits::new(size);
        {
            let mut statement =
                self.connection
                    .prepare_cached(&sql)
                    .map_err(|source| StoreError::Sqlite {
                        operation: "prepare vehicle search",
                        source,
                    })?;
            let rows = match query.country_filter() {
                Some(country) => statement.query_map([country], read_row),
                None => statement.query_map([], read_row),
            }
            .map_err(|source| StoreError::Sqlite {
                operation: "search vehicles",
                source,
            })?;
            for row in rows {
                let row = row.map_err(|source| StoreError::Sqlite {
                    operation: "read vehicle row",
                    source,
                })?;
                let candidate = decode_row(row)?;
                if let Some(score) = query.score(&candidate.vehicle) {
                    top.offer(score, candidate.id, candidate);
                }
            }
        }

        top.into_ranked()
            .into_iter()
            .map(|(score, id, mut vehicle)| {
                vehicle.vehicle.raw_xml = self.raw_xml(id)?;
                Ok(SearchHit { score, vehicle })
            })
            .collect()
    }
}

impl WatermarkStore for SqliteStore {
    fn watermark(&self, country: &CountryCode) -> Result<Option<DateTime<Utc>>, StoreError> {
        let stored: Option<String> = self
            .connection
            .query_row(
                "SELECT last_updated FROM metadata WHERE country = ?1",
                [country.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| StoreError::Sqlite {
                operation: "read watermark",
                source,
            })?;
        stored
            .map(|text| {
                DateTime::parse_from_rfc3339(&text)
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .map_err(|err| StoreError::Corrupt {
                        what: "watermark",
                        detail: format!("{text:?}: {err}"),
                    })
            })
            .transpose()
    }

    fn upsert_watermark(
        &mut self,
        country: &CountryCode,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let encoded = last_updated.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        self.connection
            .execute(
                "INSERT INTO metadata (country, last_updated) VALUES (?1, ?2)
                 ON CONFLICT(country) DO UPDATE SET last_updated = excluded.last_updated",
                params![country.as_str(), encoded],
            )
            .map(|_| ())
            .map_err(|source| StoreError::Sqlite {
                operation: "upsert watermark",
                source,
            })
    }
}
