//! Unit tests for the SQLite store and identifier lookup.

use chrono::{TimeZone, Utc};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::search::{SearchRequest, VehicleQuery};
use crate::test_support::MemoryStore;

fn vehicle(country: &str, plate: &str, maker: &str) -> Vehicle {
    let mut vehicle = Vehicle::empty(CountryCode::new(country).expect("valid country"));
    vehicle.plate = plate.into();
    vehicle.maker = maker.into();
    vehicle.raw_xml = format!("<ns:Statistik>{plate}</ns:Statistik>");
    vehicle
}

#[fixture]
fn store() -> SqliteStore {
    SqliteStore::open_in_memory().expect("open in-memory store")
}

#[rstest]
fn replace_country_swaps_only_that_partition(mut store: SqliteStore) {
    let dk = CountryCode::denmark();
    let se = CountryCode::new("se").expect("valid country");
    store
        .insert_vehicles(&[vehicle("dk", "AB12345", "AUDI"), vehicle("se", "ABC123", "SAAB")])
        .expect("seed vehicles");

    let (deleted, inserted) = store
        .replace_country(
            &dk,
            &[vehicle("dk", "CD67890", "VOLVO"), vehicle("dk", "EF11111", "KIA")],
        )
        .expect("replace partition");

    assert_eq!((deleted, inserted), (1, 2));
    assert_eq!(store.count(&dk).expect("count dk"), 2);
    assert_eq!(store.count(&se).expect("count se"), 1);
}

#[rstest]
fn assigned_ids_round_trip_through_lookup(mut store: SqliteStore) {
    store
        .insert_vehicles(&[vehicle("dk", "AB12345", "AUDI")])
        .expect("seed vehicle");
    let hits = store
        .search(&VehicleQuery::default(), 10)
        .expect("search all");
    let id = hits.first().expect("one hit").vehicle.id;

    let fetched = get_vehicle(&store, &id.to_string()).expect("lookup by id");
    assert_eq!(fetched.vehicle.plate, "AB12345");
    assert!(fetched.vehicle.raw_xml.contains("AB12345"));
}

#[rstest]
#[case("999")]
#[case("xyz")]
fn unknown_ids_are_not_found(store: SqliteStore, #[case] id: &str) {
    let err = get_vehicle(&store, id).expect_err("nothing stored");
    assert!(matches!(err, LookupError::NotFound { .. }));
    assert_eq!(err.status_code(), 404);
}

#[rstest]
fn search_honours_country_filter(mut store: SqliteStore) {
    store
        .insert_vehicles(&[vehicle("dk", "AB12345", "AUDI"), vehicle("se", "ABC123", "AUDI")])
        .expect("seed vehicles");
    let request = SearchRequest::parse(r#"{"fields":{"country":"se","maker":"audi"}}"#)
        .expect("valid request");
    let hits = store
        .search(&VehicleQuery::from_request(&request), 10)
        .expect("search");
    let plates: Vec<_> = hits.iter().map(|hit| hit.vehicle.vehicle.plate.as_str()).collect();
    assert_eq!(plates, ["ABC123"]);
}

#[rstest]
fn search_keeps_only_the_best_hits_and_attaches_their_markup(mut store: SqliteStore) {
    let mut fleet: Vec<Vehicle> = (0..50)
        .map(|n| vehicle("dk", &format!("XX{n:05}"), "AUDY"))
        .collect();
    fleet.push(vehicle("dk", "AB12345", "AUDI"));
    store.insert_vehicles(&fleet).expect("seed vehicles");
    let request = SearchRequest::parse(r#"{"fields":{"maker":"audi"},"size":2}"#)
        .expect("valid request");

    let hits = store
        .search(&VehicleQuery::from_request(&request), request.size())
        .expect("search");

    let plates: Vec<_> = hits.iter().map(|hit| hit.vehicle.vehicle.plate.as_str()).collect();
    assert_eq!(plates, ["AB12345", "XX00000"], "exact maker first, then lowest id");
    for hit in &hits {
        let plate = &hit.vehicle.vehicle.plate;
        assert_eq!(hit.vehicle.vehicle.raw_xml, format!("<ns:Statistik>{plate}</ns:Statistik>"));
    }
}

#[rstest]
fn watermark_upsert_overwrites_previous_value(mut store: SqliteStore) {
    let dk = CountryCode::denmark();
    assert_eq!(store.watermark(&dk).expect("read"), None);

    let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("timestamp");
    let second = Utc.with_ymd_and_hms(2024, 2, 1, 6, 30, 0).single().expect("timestamp");
    store.upsert_watermark(&dk, first).expect("insert watermark");
    store.upsert_watermark(&dk, second).expect("update watermark");

    assert_eq!(store.watermark(&dk).expect("read"), Some(second));
}

#[rstest]
fn store_persists_across_reopen() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("plateypus.sqlite");
    let dk = CountryCode::denmark();
    let stamp = Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).single().expect("timestamp");
    {
        let mut store = SqliteStore::open(&path).expect("open store");
        store
            .replace_country(&dk, &[vehicle("dk", "AB12345", "AUDI")])
            .expect("load vehicles");
        store.upsert_watermark(&dk, stamp).expect("write watermark");
    }

    let reopened = SqliteStore::open(&path).expect("reopen store");
    assert_eq!(reopened.count(&dk).expect("count"), 1);
    assert_eq!(reopened.watermark(&dk).expect("read"), Some(stamp));
}

#[rstest]
fn newer_schema_versions_are_rejected() {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("plateypus.sqlite");
    drop(SqliteStore::open(&path).expect("create store"));
    {
        let connection = rusqlite::Connection::open(&path).expect("open raw connection");
        connection
            .execute("UPDATE plateypus_schema_version SET version = 99", [])
            .expect("bump version");
    }

    let err = SqliteStore::open(&path).expect_err("version mismatch");
    assert!(matches!(
        err,
        StoreError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found: 99
        }
    ));
}

#[rstest]
fn default_replace_reports_deletions_and_insertions() {
    let mut store = MemoryStore::with_vehicles([vehicle("dk", "AB12345", "AUDI")]);
    let (deleted, inserted) = store
        .replace_country(&CountryCode::denmark(), &[vehicle("dk", "CD67890", "VOLVO")])
        .expect("replace");
    assert_eq!((deleted, inserted), (1, 1));
    assert_eq!(store.vehicles().len(), 1);
    assert_eq!(store.vehicles()[0].id.get(), 2);
}
