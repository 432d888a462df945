//! In-memory store used by unit and behaviour tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::search::{SearchHit, VehicleQuery};
use crate::store::{StoreError, VehicleStore, WatermarkStore};
use crate::{CountryCode, StoredVehicle, Vehicle, VehicleId};

/// Vector-backed [`VehicleStore`] and [`WatermarkStore`].
///
/// Searches scan every record, so keep datasets small. Identifiers start at
/// one and are never reused.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    vehicles: Vec<StoredVehicle>,
    watermarks: BTreeMap<CountryCode, DateTime<Utc>>,
    last_id: i64,
    fail_inserts: bool,
}

impl MemoryStore {
    /// Create a store pre-populated with `vehicles`.
    pub fn with_vehicles<I>(vehicles: I) -> Self
    where
        I: IntoIterator<Item = Vehicle>,
    {
        let mut store = Self::default();
        for vehicle in vehicles {
            store.push(vehicle);
        }
        store
    }

    /// Make every subsequent insert fail, simulating a rejected bulk load.
    #[must_use]
    pub fn failing_inserts(mut self) -> Self {
        self.fail_inserts = true;
        self
    }

    /// Every stored record in insertion order.
    #[must_use]
    pub fn vehicles(&self) -> &[StoredVehicle] {
        &self.vehicles
    }

    /// Records stored for `country`.
    pub fn vehicles_for<'a>(
        &'a self,
        country: &'a CountryCode,
    ) -> impl Iterator<Item = &'a StoredVehicle> + 'a {
        self.vehicles
            .iter()
            .filter(move |stored| &stored.vehicle.country == country)
    }

    fn push(&mut self, vehicle: Vehicle) {
        self.last_id += 1;
        self.vehicles.push(StoredVehicle {
            id: VehicleId::new(self.last_id),
            vehicle,
        });
    }
}

impl VehicleStore for MemoryStore {
    fn delete_country(&mut self, country: &CountryCode) -> Result<u64, StoreError> {
        let before = self.vehicles.len();
        self.vehicles
            .retain(|stored| &stored.vehicle.country != country);
        let deleted = before - self.vehicles.len();
        u64::try_from(deleted).map_err(|_| StoreError::OutOfRange {
            what: "deleted vehicle",
            count: deleted,
        })
    }

    fn insert_vehicles(&mut self, vehicles: &[Vehicle]) -> Result<u64, StoreError> {
        if self.fail_inserts {
            return Err(StoreError::Corrupt {
                what: "bulk insert",
                detail: "inserts are disabled for this store".into(),
            });
        }
        for vehicle in vehicles {
            self.push(vehicle.clone());
        }
        u64::try_from(vehicles.len()).map_err(|_| StoreError::OutOfRange {
            what: "inserted vehicle",
            count: vehicles.len(),
        })
    }

    fn get_vehicle(&self, id: VehicleId) -> Result<Option<StoredVehicle>, StoreError> {
        Ok(self.vehicles.iter().find(|stored| stored.id == id).cloned())
    }

    fn search(&self, query: &VehicleQuery, size: usize) -> Result<Vec<SearchHit>, StoreError> {
        Ok(query.rank(self.vehicles.iter().cloned(), size))
    }
}

impl WatermarkStore for MemoryStore {
    fn watermark(&self, country: &CountryCode) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.watermarks.get(country).copied())
    }

    fn upsert_watermark(
        &mut self,
        country: &CountryCode,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.watermarks.insert(country.clone(), last_updated);
        Ok(())
    }
}
