//! Unit tests for the register ETL.

use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::sync::Once;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, TimeZone, Utc};
use plateypus_core::test_support::MemoryStore;
use plateypus_core::{CountryCode, Vehicle, WatermarkStore, minimum_timestamp};
use rstest::{fixture, rstest};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::*;
use crate::remote::{DOWNLOAD_CHUNK_SIZE, RemoteEntry, StubDirectory};


const NAMESPACE: &str = "http://skat.dk/dmr/2007/05/31/";

fn record(plate: &str, maker: &str) -> String {
    format!(
        "<ns:Statistik>\
           <ns:RegistreringNummerNummer>{plate}</ns:RegistreringNummerNummer>\
           <ns:KoeretoejOplysningGrundStruktur>\
             <ns:KoeretoejOplysningFoersteRegistreringDato>2015-03-01T00:00:00.000+01:00</ns:KoeretoejOplysningFoersteRegistreringDato>\
             <ns:KoeretoejOplysningStelNummer>WAUZZZ8V5FA{plate}</ns:KoeretoejOplysningStelNummer>\
             <ns:KoeretoejBetegnelseStruktur>\
               <ns:KoeretoejMaerkeTypeNavn>{maker}</ns:KoeretoejMaerkeTypeNavn>\
               <ns:Model><ns:KoeretoejModelTypeNavn>A3</ns:KoeretoejModelTypeNavn></ns:Model>\
               <ns:Variant><ns:KoeretoejVariantTypeNavn>1.4 TFSI</ns:KoeretoejVariantTypeNavn></ns:Variant>\
             </ns:KoeretoejBetegnelseStruktur>\
             <ns:KoeretoejFarveStruktur><ns:FarveTypeStruktur><ns:FarveTypeNavn>Sort</ns:FarveTypeNavn></ns:FarveTypeStruktur></ns:KoeretoejFarveStruktur>\
             <ns:KoeretoejMotorStruktur><ns:DrivkraftTypeStruktur><ns:DrivkraftTypeNavn>Benzin</ns:DrivkraftTypeNavn></ns:DrivkraftTypeStruktur></ns:KoeretoejMotorStruktur>\
           </ns:KoeretoejOplysningGrundStruktur>\
         </ns:Statistik>"
    )
}

fn document(records: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ns:ESStatistikListeModtag xmlns:ns=\"{NAMESPACE}\">{}</ns:ESStatistikListeModtag>",
        records.concat()
    )
}

/// ZIP archive bytes holding `entries` as `(name, contents)` pairs.
fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start archive entry");
        writer
            .write_all(contents.as_bytes())
            .expect("write archive entry");
    }
    writer.finish().expect("finish archive").into_inner()
}

fn write_archive(dir: &Utf8Path, name: &str, entries: &[(&str, &str)]) -> Utf8PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, zip_bytes(entries)).expect("write archive");
    path
}

fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir")
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, 4, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn entry(name: &str, day: u32) -> RemoteEntry {
    RemoteEntry {
        modified: at(day),
        size: 10,
        name: name.into(),
    }
}

#[derive(Debug, Clone, Copy)]
struct FixedSpace(u64);

impl DiskSpace for FixedSpace {
    fn available(&self, _dir: &Utf8Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

thread_local! {
    static CAPTURED: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Records log output per test thread.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        CAPTURED.with(|captured| {
            captured
                .borrow_mut()
                .push((record.level(), record.args().to_string()));
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Run `action`, returning its result and the log records it emitted.
fn capture_logs<R>(action: impl FnOnce() -> R) -> (R, Vec<(log::Level, String)>) {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger in unit tests");
        log::set_max_level(log::LevelFilter::Trace);
    });
    CAPTURED.with(|captured| captured.borrow_mut().clear());
    let result = action();
    let logs = CAPTURED.with(|captured| captured.borrow_mut().drain(..).collect());
    (result, logs)
}

#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

#[rstest]
fn parse_maps_every_danish_field() {
    let xml = document(&[record("AB12345", "AUDI")]);
    let vehicles = Transformer::danish()
        .parse(xml.as_bytes())
        .expect("well-formed document");

    let [vehicle] = vehicles.as_slice() else {
        panic!("expected one vehicle, got {vehicles:?}");
    };
    assert_eq!(vehicle.country, CountryCode::denmark());
    assert_eq!(vehicle.plate, "AB12345");
    assert_eq!(vehicle.first_reg, "2015-03-01T00:00:00.000+01:00");
    assert_eq!(vehicle.vin, "WAUZZZ8V5FAAB12345");
    assert_eq!(vehicle.maker, "AUDI");
    assert_eq!(vehicle.model, "A3 1.4 TFSI");
    assert_eq!(vehicle.fuel_type, "Benzin");
    assert_eq!(vehicle.colour, "Sort");
    assert!(
        vehicle
            .raw_xml
            .starts_with(&format!("<ns:Statistik xmlns:ns=\"{NAMESPACE}\">"))
    );
    assert!(vehicle.raw_xml.ends_with("</ns:Statistik>"));
    assert!(vehicle.raw_xml.contains("<ns:FarveTypeNavn>Sort</ns:FarveTypeNavn>"));
}

#[rstest]
fn raw_markup_parses_on_its_own() {
    let xml = document(&[record("AB12345", "AUDI")]);
    let vehicles = Transformer::danish()
        .parse(xml.as_bytes())
        .expect("well-formed document");

    let reparsed = Transformer::danish()
        .parse(vehicles[0].raw_xml.as_bytes())
        .expect("captured fragment is well-formed");
    assert_eq!(reparsed.len(), 1);
    assert_eq!(reparsed[0].plate, "AB12345");
    assert_eq!(reparsed[0].model, "A3 1.4 TFSI");
}

#[rstest]
fn raw_markup_keeps_declarations_the_record_makes_itself() {
    let xml = format!(
        "<ns:Liste xmlns:ns=\"{NAMESPACE}\" xmlns:x=\"urn:other\">\
           <ns:Statistik xmlns:ns=\"{NAMESPACE}\"><ns:RegistreringNummerNummer>AB12345</ns:RegistreringNummerNummer></ns:Statistik>\
         </ns:Liste>"
    );
    let vehicles = Transformer::danish()
        .parse(xml.as_bytes())
        .expect("well-formed document");
    assert_eq!(
        vehicles[0].raw_xml,
        format!(
            "<ns:Statistik xmlns:ns=\"{NAMESPACE}\" xmlns:x=\"urn:other\">\
             <ns:RegistreringNummerNummer>AB12345</ns:RegistreringNummerNummer></ns:Statistik>"
        )
    );
}

#[rstest]
fn parse_keeps_records_in_document_order() {
    let xml = document(&[record("AB12345", "AUDI"), record("CD67890", "VOLVO")]);
    let vehicles = Transformer::danish()
        .parse(xml.as_bytes())
        .expect("well-formed document");
    let plates: Vec<&str> = vehicles.iter().map(|v| v.plate.as_str()).collect();
    assert_eq!(plates, ["AB12345", "CD67890"]);
}

#[rstest]
fn records_before_the_prefix_declaration_are_ignored() {
    let xml = format!(
        "<root><ns:Statistik><ns:RegistreringNummerNummer>XX00000</ns:RegistreringNummerNummer></ns:Statistik>\
         <ns:Liste xmlns:ns=\"{NAMESPACE}\">{}</ns:Liste></root>",
        record("AB12345", "AUDI")
    );
    let vehicles = Transformer::danish()
        .parse(xml.as_bytes())
        .expect("well-formed document");
    let plates: Vec<&str> = vehicles.iter().map(|v| v.plate.as_str()).collect();
    assert_eq!(plates, ["AB12345"]);
}

#[rstest]
fn records_bound_to_another_prefix_are_ignored() {
    let xml = format!(
        "<other:Liste xmlns:other=\"{NAMESPACE}\">\
           <other:Statistik><other:RegistreringNummerNummer>AB12345</other:RegistreringNummerNummer></other:Statistik>\
         </other:Liste>"
    );
    let vehicles = Transformer::danish()
        .parse(xml.as_bytes())
        .expect("well-formed document");
    assert!(vehicles.is_empty());
}

#[rstest]
fn field_text_is_leading_text_only() {
    let xml = format!(
        "<ns:Liste xmlns:ns=\"{NAMESPACE}\"><ns:Statistik>\
           <ns:KoeretoejMaerkeTypeNavn> AUDI <ns:Note>ignored</ns:Note>trailing</ns:KoeretoejMaerkeTypeNavn>\
         </ns:Statistik></ns:Liste>"
    );
    let vehicles = Transformer::danish()
        .parse(xml.as_bytes())
        .expect("well-formed document");
    assert_eq!(vehicles[0].maker, " AUDI ");
}

#[rstest]
fn missing_fields_are_empty_and_repeated_fields_take_the_first() {
    let xml = format!(
        "<ns:Liste xmlns:ns=\"{NAMESPACE}\"><ns:Statistik>\
           <ns:DrivkraftTypeNavn>Benzin</ns:DrivkraftTypeNavn>\
           <ns:DrivkraftTypeNavn>El</ns:DrivkraftTypeNavn>\
         </ns:Statistik></ns:Liste>"
    );
    let vehicles = Transformer::danish()
        .parse(xml.as_bytes())
        .expect("well-formed document");
    let vehicle = &vehicles[0];
    assert_eq!(vehicle.fuel_type, "Benzin");
    assert_eq!(vehicle.plate, "");
    assert_eq!(vehicle.model, " ");
}

#[rstest]
fn missing_and_repeated_fields_are_warned_about() {
    let record = RecordElement::from_fields([
        ("DrivkraftTypeNavn", "Benzin"),
        ("DrivkraftTypeNavn", "El"),
        ("DrivkraftTypeNavn", "Diesel"),
    ]);

    let (texts, logs) = capture_logs(|| {
        (
            record.field_text("KoeretoejMaerkeTypeNavn"),
            record.field_text("DrivkraftTypeNavn"),
        )
    });

    assert_eq!(texts, (String::new(), "Benzin".to_owned()));
    let warnings: Vec<&str> = logs
        .iter()
        .filter(|(level, _)| *level == log::Level::Warn)
        .map(|(_, message)| message.as_str())
        .collect();
    assert_eq!(warnings.len(), 2, "got {logs:?}");
    assert!(warnings[0].contains("no KoeretoejMaerkeTypeNavn element"));
    assert!(warnings[1].contains("3 DrivkraftTypeNavn elements"));
}

#[rstest]
fn record_elements_debug_their_captured_fields() {
    let record = RecordElement::from_fields([("FarveTypeNavn", "Sort")]);
    let rendered = format!("{record:?}");
    assert!(rendered.starts_with("RecordElement"), "got {rendered}");
    assert!(rendered.contains("Sort"), "got {rendered}");
    assert_eq!(record.occurrences("FarveTypeNavn").collect::<Vec<_>>(), ["Sort"]);
}

#[rstest]
fn unique_fields_are_not_warned_about() {
    let record = RecordElement::from_fields([("FarveTypeNavn", "Sort")]);
    let (text, logs) = capture_logs(|| record.field_text("FarveTypeNavn"));
    assert_eq!(text, "Sort");
    assert!(logs.is_empty(), "got {logs:?}");
}

#[rstest]
fn lookup_field_distinguishes_repetition() {
    let record = RecordElement::from_fields([("a", "1"), ("b", "2"), ("b", "3")]);
    assert_eq!(record.lookup_field("missing"), FieldLookup::Missing);
    assert_eq!(record.lookup_field("a"), FieldLookup::Unique("1"));
    assert_eq!(
        record.lookup_field("b"),
        FieldLookup::Repeated {
            first: "2",
            count: 2
        }
    );
}

#[rstest]
fn parse_reports_malformed_documents() {
    let xml = format!(
        "<ns:Liste xmlns:ns=\"{NAMESPACE}\">{}<ns:Statistik></ns:Wrong></ns:Liste>",
        record("AB12345", "AUDI")
    );
    let err = Transformer::danish()
        .parse(xml.as_bytes())
        .expect_err("mismatched end tag");
    assert!(matches!(err, ParseError::Xml { .. }), "got {err:?}");
}

#[rstest]
fn build_from_xml_reads_single_entry_archives(temp_dir: TempDir) {
    let dir = utf8_dir(&temp_dir);
    let xml = document(&[record("AB12345", "AUDI"), record("CD67890", "VOLVO")]);
    let path = write_archive(&dir, "dump.zip", &[("dump.xml", &xml)]);

    let mut reports = Vec::new();
    let vehicles =
        Transformer::danish().build_from_xml_with_progress(&path, &mut |p| reports.push(p));

    assert_eq!(vehicles.len(), 2);
    let last = reports.last().expect("progress reported");
    assert_eq!(last.bytes, u64::try_from(xml.len()).expect("fits"));
    assert_eq!(last.chunks, u64::try_from(reports.len()).expect("fits"));
}

#[rstest]
fn build_from_xml_rejects_multi_entry_archives(temp_dir: TempDir) {
    let dir = utf8_dir(&temp_dir);
    let xml = document(&[record("AB12345", "AUDI")]);
    let path = write_archive(&dir, "dump.zip", &[("a.xml", &xml), ("b.xml", &xml)]);

    assert!(open_xml_stream(&path).is_none());
    assert!(Transformer::danish().build_from_xml(&path).is_empty());
}

#[rstest]
fn build_from_xml_discards_partial_batches(temp_dir: TempDir) {
    let dir = utf8_dir(&temp_dir);
    let xml = format!(
        "<ns:Liste xmlns:ns=\"{NAMESPACE}\">{}<ns:Statistik></ns:Wrong>",
        record("AB12345", "AUDI")
    );
    let path = write_archive(&dir, "dump.zip", &[("dump.xml", &xml)]);
    assert!(Transformer::danish().build_from_xml(&path).is_empty());
}

#[rstest]
fn build_from_xml_rejects_files_that_are_not_archives(temp_dir: TempDir) {
    let path = utf8_dir(&temp_dir).join("dump.zip");
    std::fs::write(&path, document(&[record("AB12345", "AUDI")])).expect("write plain XML");

    let (vehicles, logs) = capture_logs(|| {
        assert!(open_xml_stream(&path).is_none());
        Transformer::danish().build_from_xml(&path)
    });

    assert!(vehicles.is_empty());
    assert!(
        logs.iter()
            .any(|(level, message)| *level == log::Level::Error
                && message.contains("is not a readable ZIP archive")),
        "got {logs:?}"
    );
}

#[rstest]
fn build_from_xml_rejects_empty_archives(temp_dir: TempDir) {
    let path = write_archive(&utf8_dir(&temp_dir), "dump.zip", &[]);

    let (vehicles, logs) = capture_logs(|| Transformer::danish().build_from_xml(&path));

    assert!(vehicles.is_empty());
    assert!(
        logs.iter()
            .any(|(level, message)| *level == log::Level::Error && message.contains("0 entries")),
        "got {logs:?}"
    );
}

#[rstest]
fn build_from_xml_tolerates_missing_archives(temp_dir: TempDir) {
    let missing = utf8_dir(&temp_dir).join("absent.zip");
    assert!(Transformer::danish().build_from_xml(&missing).is_empty());
}

#[rstest]
fn only_denmark_has_a_transformer() {
    assert!(Transformer::for_country(&CountryCode::denmark()).is_some());
    let sweden = CountryCode::new("se").expect("valid country");
    assert!(Transformer::for_country(&sweden).is_none());
}

#[rstest]
#[case(0, 0)]
#[case(DOWNLOAD_CHUNK_SIZE as u64 / 2 - 1, 0)]
#[case(DOWNLOAD_CHUNK_SIZE as u64 / 2, 1)]
#[case(DOWNLOAD_CHUNK_SIZE as u64 * 3 + 1, 3)]
#[case(u64::MAX, u64::MAX / DOWNLOAD_CHUNK_SIZE as u64)]
fn expected_chunks_rounds_to_the_nearest_block(#[case] size: u64, #[case] chunks: u64) {
    assert_eq!(expected_chunks(size), chunks);
}

#[rstest]
#[case(vec![entry("a.zip", 1), entry("b.zip", 3), entry("c.zip", 2)], Some("b.zip"))]
#[case(vec![entry("a.zip", 3), entry("b.zip", 3)], Some("b.zip"))]
#[case(Vec::new(), None)]
fn newest_entry_prefers_later_listings_on_ties(
    #[case] entries: Vec<RemoteEntry>,
    #[case] expected: Option<&str>,
) {
    let newest = newest_entry(entries);
    assert_eq!(newest.as_ref().map(|e| e.name.as_str()), expected);
}

#[rstest]
fn is_newer_compares_against_the_stored_watermark() {
    let dk = CountryCode::denmark();
    let mut store = MemoryStore::default();
    assert!(is_newer(&store, &dk, at(1)).expect("read watermark"));
    assert!(!is_newer(&store, &dk, minimum_timestamp()).expect("read watermark"));

    store.upsert_watermark(&dk, at(2)).expect("store watermark");
    assert!(!is_newer(&store, &dk, at(1)).expect("read watermark"));
    assert!(!is_newer(&store, &dk, at(2)).expect("read watermark"));
    assert!(is_newer(&store, &dk, at(3)).expect("read watermark"));
}

#[rstest]
fn extractor_downloads_newer_files(temp_dir: TempDir) {
    let dir = utf8_dir(&temp_dir).join("downloads");
    let payload = vec![7_u8; DOWNLOAD_CHUNK_SIZE * 2 + 10];
    let directory = StubDirectory::default()
        .with_file("old.zip", at(1), b"old".to_vec())
        .with_file("ESStatistikListeModtag-20240603.zip", at(3), payload.clone());
    let store = MemoryStore::default();

    let mut ticks = Vec::new();
    let extraction = Extractor::new(directory.clone(), &store, CountryCode::denmark(), &dir)
        .download_if_newer_with_progress(&mut |chunk, expected| ticks.push((chunk, expected)))
        .expect("download");

    let expected_path = dir.join("ESStatistikListeModtag-20240603.zip");
    assert_eq!(
        extraction,
        Extraction::Newer {
            archive_path: expected_path.clone(),
            timestamp: at(3),
        }
    );
    assert_eq!(std::fs::read(&expected_path).expect("read archive"), payload);
    assert_eq!(directory.downloads(), 1);
    assert_eq!(ticks.len(), 3);
    assert!(ticks.iter().all(|(_, expected)| *expected == 2));
}

#[rstest]
fn extractor_skips_files_that_are_not_newer(temp_dir: TempDir) {
    let dir = utf8_dir(&temp_dir);
    let directory = StubDirectory::default().with_file("dump.zip", at(2), b"zip".to_vec());
    let dk = CountryCode::denmark();
    let mut store = MemoryStore::default();
    store.upsert_watermark(&dk, at(2)).expect("store watermark");

    let extraction = Extractor::new(directory.clone(), &store, dk, &dir)
        .download_if_newer()
        .expect("list");

    assert_eq!(
        extraction,
        Extraction::UpToDate {
            timestamp: minimum_timestamp()
        }
    );
    assert_eq!(directory.downloads(), 0);
    assert!(!dir.join("dump.zip").exists());
}

#[rstest]
fn extractor_reports_empty_listings(temp_dir: TempDir) {
    let store = MemoryStore::default();
    let err = Extractor::new(
        StubDirectory::default(),
        &store,
        CountryCode::denmark(),
        utf8_dir(&temp_dir),
    )
    .download_if_newer()
    .expect_err("nothing to download");
    assert!(matches!(err, ExtractError::EmptyListing));
}

#[rstest]
#[case(1_000, 1_000)]
#[case(1_000, 999)]
fn extractor_requires_more_space_than_the_file(
    temp_dir: TempDir,
    #[case] size: u64,
    #[case] free: u64,
) {
    let directory = StubDirectory::default().with_listed_file("dump.zip", at(1), size);
    let store = MemoryStore::default();
    let disk = FixedSpace(free);

    let err = Extractor::new(
        directory.clone(),
        &store,
        CountryCode::denmark(),
        utf8_dir(&temp_dir),
    )
    .with_disk_space(&disk)
    .download_if_newer()
    .expect_err("not enough space");

    match err {
        ExtractError::InsufficientSpace {
            file_name,
            required,
            available,
        } => {
            assert_eq!(file_name, "dump.zip");
            assert_eq!((required, available), (size, free));
        }
        other => panic!("expected insufficient space, got {other:?}"),
    }
    assert_eq!(directory.downloads(), 0);
}

#[rstest]
fn extractor_keeps_downloads_inside_the_download_dir(temp_dir: TempDir) {
    let dir = utf8_dir(&temp_dir);
    let directory = StubDirectory::default().with_file("../escape.zip", at(1), b"zip".to_vec());
    let store = MemoryStore::default();

    let extraction = Extractor::new(directory, &store, CountryCode::denmark(), &dir)
        .download_if_newer()
        .expect("download");
    let Extraction::Newer { archive_path, .. } = extraction else {
        panic!("expected a download");
    };
    assert_eq!(archive_path, dir.join("escape.zip"));
}

fn sample(country: &CountryCode, plate: &str) -> Vehicle {
    let mut vehicle = Vehicle::empty(country.clone());
    vehicle.plate = plate.into();
    vehicle
}

#[rstest]
fn load_replaces_the_partition_then_advances_the_watermark() {
    let dk = CountryCode::denmark();
    let se = CountryCode::new("se").expect("valid country");
    let mut store = MemoryStore::with_vehicles([
        sample(&dk, "OLD0001"),
        sample(&dk, "OLD0002"),
        sample(&se, "ABC123"),
    ]);

    let report = load_vehicles(&mut store, &dk, &[sample(&dk, "AB12345")], at(4))
        .expect("load succeeds");

    assert_eq!(
        report,
        LoadReport {
            deleted: 2,
            inserted: 1
        }
    );
    let plates: Vec<&str> = store
        .vehicles_for(&dk)
        .map(|v| v.vehicle.plate.as_str())
        .collect();
    assert_eq!(plates, ["AB12345"]);
    assert_eq!(store.vehicles_for(&se).count(), 1);
    assert_eq!(store.watermark(&dk).expect("read watermark"), Some(at(4)));
}

#[rstest]
fn failed_loads_leave_the_watermark_untouched() {
    let dk = CountryCode::denmark();
    let mut store = MemoryStore::default().failing_inserts();

    let err = load_vehicles(&mut store, &dk, &[sample(&dk, "AB12345")], at(4))
        .expect_err("insert fails");

    assert!(
        matches!(err, LoadError::Replace { attempted: 1, .. }),
        "got {err:?}"
    );
    assert_eq!(store.watermark(&dk).expect("read watermark"), None);
}
