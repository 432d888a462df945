//! Test helpers for building register dumps and scratch workspaces.

use std::io::{Cursor, Write};

use camino::Utf8PathBuf;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub(super) const DUMP_NAME: &str = "ESStatistikListeModtag-20240603.zip";

/// Scratch directory with a UTF-8 path.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").field("root", &self.root).finish()
    }
}

pub(super) fn dump_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 4, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn record(plate: &str, maker: &str, model: &str) -> String {
    format!(
        "<ns:Statistik>\
           <ns:RegistreringNummerNummer>{plate}</ns:RegistreringNummerNummer>\
           <ns:KoeretoejOplysningGrundStruktur>\
             <ns:KoeretoejOplysningStelNummer>VIN{plate}</ns:KoeretoejOplysningStelNummer>\
             <ns:KoeretoejBetegnelseStruktur>\
               <ns:KoeretoejMaerkeTypeNavn>{maker}</ns:KoeretoejMaerkeTypeNavn>\
               <ns:Model><ns:KoeretoejModelTypeNavn>{model}</ns:KoeretoejModelTypeNavn></ns:Model>\
             </ns:KoeretoejBetegnelseStruktur>\
           </ns:KoeretoejOplysningGrundStruktur>\
         </ns:Statistik>"
    )
}

/// ZIP bytes of a Danish dump holding an Audi and a Volvo.
pub(super) fn danish_dump() -> Vec<u8> {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ns:ESStatistikListeModtag xmlns:ns=\"http://skat.dk/dmr/2007/05/31/\">{}{}\
         </ns:ESStatistikListeModtag>",
        record("AB12345", "AUDI", "A3"),
        record("CD67890", "VOLVO", "V70"),
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("ESStatistikListeModtag.xml", SimpleFileOptions::default())
        .expect("start archive entry");
    writer
        .write_all(xml.as_bytes())
        .expect("write archive entry");
    writer.finish().expect("finish archive").into_inner()
}
