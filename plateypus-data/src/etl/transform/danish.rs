//! Field mapping for the Danish motor register (DMR) statistics dump.

use plateypus_core::{CountryCode, Vehicle};

use super::{RecordElement, RecordFormat};

/// Record boundary of the DMR dump: `<ns:Statistik>`.
pub const DANISH_RECORD_FORMAT: RecordFormat = RecordFormat::new("ns", "Statistik");

/// Convert one `Statistik` record into a [`Vehicle`].
///
/// The model combines the model and variant names with a single space.
#[must_use]
pub fn map_danish_record(country: &CountryCode, record: &RecordElement) -> Vehicle {
    Vehicle {
        country: country.clone(),
        plate: record.field_text("RegistreringNummerNummer"),
        first_reg: record.field_text("KoeretoejOplysningFoersteRegistreringDato"),
        vin: record.field_text("KoeretoejOplysningStelNummer"),
        maker: record.field_text("KoeretoejMaerkeTypeNavn"),
        model: format!(
            "{} {}",
            record.field_text("KoeretoejModelTypeNavn"),
            record.field_text("KoeretoejVariantTypeNavn")
        ),
        fuel_type: record.field_text("DrivkraftTypeNavn"),
        colour: record.field_text("FarveTypeNavn"),
        raw_xml: record.raw_xml(),
    }
}
