//! Streaming conversion of register dumps into vehicle records.
//!
//! Dumps are too large to hold in memory, so the XML document is read with a
//! pull parser and each record is converted and dropped as soon as its
//! closing tag is seen. Namespace prefixes are resolved incrementally as the
//! declaring elements stream past.

use std::io::BufRead;
use std::str::Utf8Error;

use camino::Utf8Path;
use plateypus_core::{CountryCode, Vehicle};
use quick_xml::Reader;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use zip::result::ZipError;

mod archive;
mod danish;
mod namespace;
mod record;

pub use archive::{ParseProgress, READ_CHUNK_SIZE, XmlArchive, open_xml_stream};
pub use danish::{DANISH_RECORD_FORMAT, map_danish_record};
pub use namespace::{NamespaceResolver, ResolvedName};
pub use record::{FieldLookup, RecordElement};

/// Converts one finished record into a vehicle for `country`.
pub type RecordMapper = fn(&CountryCode, &RecordElement) -> Vehicle;

/// Prefixed element name delimiting one record in a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFormat {
    prefix: &'static str,
    local: &'static str,
}

impl RecordFormat {
    /// Records are `<prefix:local>` elements.
    #[must_use]
    pub const fn new(prefix: &'static str, local: &'static str) -> Self {
        Self { prefix, local }
    }

    /// Namespace prefix the dump binds for record elements.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Local name of record elements.
    #[must_use]
    pub const fn local(&self) -> &'static str {
        self.local
    }

    /// Whether `name` is a record boundary given the bindings in `resolver`.
    ///
    /// Nothing matches until the format prefix has been declared.
    #[must_use]
    pub fn matches(&self, resolver: &NamespaceResolver, name: &ResolvedName) -> bool {
        name.local == self.local
            && name
                .namespace
                .as_deref()
                .is_some_and(|uri| resolver.lookup(Some(self.prefix)) == Some(uri))
    }
}

/// Errors that stop a transformation part way through a document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not well-formed.
    #[error("malformed XML near byte {position}: {source}")]
    Xml {
        /// Byte offset the parser had reached.
        position: u64,
        /// Parser failure.
        #[source]
        source: quick_xml::Error,
    },
    /// An attribute could not be read.
    #[error("malformed attribute: {source}")]
    Attribute {
        /// Attribute parser failure.
        #[from]
        source: AttrError,
    },
    /// Text or an attribute value holds an invalid escape.
    #[error("cannot decode character data: {source}")]
    Escape {
        /// Unescaping failure.
        #[from]
        source: quick_xml::Error,
    },
    /// A tag name is not valid UTF-8.
    #[error("tag name {detail:?} is not valid UTF-8")]
    Encoding {
        /// Lossy rendering of the offending name.
        detail: String,
        /// Decoder failure.
        #[source]
        source: Utf8Error,
    },
    /// The raw markup of a record could not be buffered.
    #[error("cannot capture record markup: {detail}")]
    Markup {
        /// Writer failure.
        detail: String,
    },
    /// The archive entry could not be opened.
    #[error("cannot read archive entry: {source}")]
    Archive {
        /// Archive failure.
        #[from]
        source: ZipError,
    },
}

/// Turns a dump archive into [`Vehicle`] records for one country.
#[derive(Debug, Clone)]
pub struct Transformer {
    country: CountryCode,
    format: RecordFormat,
    mapper: RecordMapper,
}

impl Transformer {
    /// Build a transformer from its record boundary and field mapping.
    #[must_use]
    pub const fn new(country: CountryCode, format: RecordFormat, mapper: RecordMapper) -> Self {
        Self {
            country,
            format,
            mapper,
        }
    }

    /// Transformer for the Danish motor register.
    #[must_use]
    pub fn danish() -> Self {
        Self::new(
            CountryCode::denmark(),
            DANISH_RECORD_FORMAT,
            map_danish_record,
        )
    }

    /// Transformer for `country`, if its register format is known.
    #[must_use]
    pub fn for_country(country: &CountryCode) -> Option<Self> {
        (country == &CountryCode::denmark()).then(Self::danish)
    }

    /// Country the produced records belong to.
    #[must_use]
    pub const fn country(&self) -> &CountryCode {
        &self.country
    }

    /// Transform the archive at `path`, logging read progress at debug level.
    #[must_use]
    pub fn build_from_xml(&self, path: &Utf8Path) -> Vec<Vehicle> {
        self.build_from_xml_with_progress(path, &mut |progress| {
            log::debug!(
                "read {} chunks ({} bytes) of {path}",
                progress.chunks,
                progress.bytes
            );
        })
    }

    /// Transform the archive at `path`, reporting each block read.
    ///
    /// Archives that are unreadable or do not hold exactly one document yield
    /// no records. A document that turns out to be malformed part way through
    /// also yields no records; the partial batch is discarded.
    pub fn build_from_xml_with_progress(
        &self,
        path: &Utf8Path,
        progress: &mut dyn FnMut(ParseProgress),
    ) -> Vec<Vehicle> {
        let Some(mut archive) = open_xml_stream(path) else {
            return Vec::new();
        };
        let entry = archive.entry_name().to_owned();
        let outcome = archive
            .stream(progress)
            .map_err(ParseError::from)
            .and_then(|reader| self.parse(reader));
        match outcome {
            Ok(vehicles) => {
                log::info!(
                    "parsed {} {} vehicles from {entry}",
                    vehicles.len(),
                    self.country
                );
                vehicles
            }
            Err(err) => {
                log::error!("stopped parsing {entry} in {path}: {err}; discarding partial batch");
                Vec::new()
            }
        }
    }

    /// Parse an XML document, converting each record as it closes.
    ///
    /// # Examples
    /// ```
    /// use plateypus_data::etl::Transformer;
    ///
    /// let xml = r#"<ns:Liste xmlns:ns="http://skat.dk/dmr/2007/05/31/">
    ///   <ns:Statistik>
    ///     <ns:RegistreringNummerNummer>AB12345</ns:RegistreringNummerNummer>
    ///     <ns:KoeretoejMaerkeTypeNavn>AUDI</ns:KoeretoejMaerkeTypeNavn>
    ///   </ns:Statistik>
    /// </ns:Liste>"#;
    /// let vehicles = Transformer::danish().parse(xml.as_bytes()).expect("well-formed");
    /// assert_eq!(vehicles.len(), 1);
    /// assert_eq!(vehicles[0].plate, "AB12345");
    /// assert_eq!(vehicles[0].maker, "AUDI");
    /// ```
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<Vehicle>, ParseError> {
        let mut xml = Reader::from_reader(reader);
        let mut resolver = NamespaceResolver::default();
        let mut record: Option<RecordElement> = None;
        let mut vehicles = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let event = xml
                .read_event_into(&mut buf)
                .map_err(|source| ParseError::Xml {
                    position: u64::try_from(xml.buffer_position()).unwrap_or(u64::MAX),
                    source,
                })?;
            match &event {
                Event::Start(start) => {
                    resolver.enter(start)?;
                    let name = resolver.resolve(start.name().as_ref())?;
                    self.open_element(&resolver, &name, &event, &mut record)?;
                }
                Event::Empty(start) => {
                    resolver.enter(start)?;
                    let name = resolver.resolve(start.name().as_ref())?;
                    self.open_element(&resolver, &name, &event, &mut record)?;
                    self.close_element(&mut record, None, &mut vehicles)?;
                    resolver.leave();
                }
                Event::End(_) => {
                    self.close_element(&mut record, Some(&event), &mut vehicles)?;
                    resolver.leave();
                }
                Event::Text(text) => {
                    if let Some(current) = record.as_mut() {
                        current.text(&text.unescape()?);
                        current.capture(&event)?;
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = record.as_mut() {
                        current.text(&String::from_utf8_lossy(data));
                        current.capture(&event)?;
                    }
                }
                Event::Eof => break,
                _ => {
                    if let Some(current) = record.as_mut() {
                        current.capture(&event)?;
                    }
                }
            }
        }

        Ok(vehicles)
    }

    fn open_element(
        &self,
        resolver: &NamespaceResolver,
        name: &ResolvedName,
        event: &Event<'_>,
        record: &mut Option<RecordElement>,
    ) -> Result<(), ParseError> {
        if let Some(current) = record.as_mut() {
            current.open_child(name.namespace.as_deref(), &name.local);
            return current.capture(event);
        }
        if let Some(namespace) = name.namespace.as_deref()
            && self.format.matches(resolver, name)
        {
            let mut started = RecordElement::new(namespace);
            started.capture(&declare_inherited(event, resolver))?;
            *record = Some(started);
        }
        Ok(())
    }

    /// Close the innermost element. `end` is the closing tag to capture, or
    /// `None` for self-closing elements already captured on open.
    fn close_element(
        &self,
        record: &mut Option<RecordElement>,
        end: Option<&Event<'_>>,
        vehicles: &mut Vec<Vehicle>,
    ) -> Result<(), ParseError> {
        let Some(current) = record.as_mut() else {
            return Ok(());
        };
        if let Some(end) = end {
            current.capture(end)?;
        }
        if current.depth() > 1 {
            current.close_child();
            return Ok(());
        }
        if let Some(finished) = record.take() {
            vehicles.push((self.mapper)(&self.country, &finished));
        }
        Ok(())
    }
}

/// Copy a record's root tag with the namespace bindings it inherits, so the
/// captured markup parses on its own.
fn declare_inherited(event: &Event<'_>, resolver: &NamespaceResolver) -> Event<'static> {
    let with_bindings = |start: &BytesStart<'_>| {
        let mut root = start.to_owned();
        for (prefix, uri) in resolver.inherited() {
            let key = prefix.map_or_else(|| "xmlns".to_owned(), |prefix| format!("xmlns:{prefix}"));
            root.push_attribute((key.as_str(), uri));
        }
        root
    };
    match event {
        Event::Start(start) => Event::Start(with_bindings(start)),
        Event::Empty(start) => Event::Empty(with_bindings(start)),
        other => other.clone().into_owned(),
    }
}
