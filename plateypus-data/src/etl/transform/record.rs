//! Accumulation of a single record element while it streams past.

use quick_xml::Writer;
use quick_xml::events::Event;

use super::ParseError;

/// How many times a field occurred in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLookup<'a> {
    /// The field never occurred.
    Missing,
    /// The field occurred once.
    Unique(&'a str),
    /// The field occurred `count` times; `first` is the earliest text.
    Repeated {
        /// Text of the first occurrence in document order.
        first: &'a str,
        /// Total number of occurrences.
        count: usize,
    },
}

/// Leading text of every descendant of one record, plus its raw markup.
///
/// Only descendants in the record's own namespace are kept. Text is the
/// character data an element holds before its first child, untrimmed.
pub struct RecordElement {
    namespace: String,
    fields: Vec<(String, String)>,
    open: Vec<OpenElement>,
    markup: Writer<Vec<u8>>,
}

impl std::fmt::Debug for RecordElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordElement")
            .field("namespace", &self.namespace)
            .field("fields", &self.fields)
            .field("depth", &self.open.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct OpenElement {
    field: Option<usize>,
    saw_child: bool,
}

impl RecordElement {
    /// Begin a record whose root element lives in `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            fields: Vec::new(),
            open: vec![OpenElement {
                field: None,
                saw_child: false,
            }],
            markup: Writer::new(Vec::new()),
        }
    }

    /// Build a record from already extracted `(local name, text)` pairs.
    #[must_use]
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::new(String::new());
        record.fields = fields
            .into_iter()
            .map(|(name, text)| (name.into(), text.into()))
            .collect();
        record
    }

    /// Depth of open elements, counting the record root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Copy `event` into the raw markup buffer.
    pub fn capture(&mut self, event: &Event<'_>) -> Result<(), ParseError> {
        self.markup
            .write_event(event.clone())
            .map_err(|err| ParseError::Markup {
                detail: err.to_string(),
            })
    }

    /// A child element opened; `namespace` and `local` are its resolved name.
    pub fn open_child(&mut self, namespace: Option<&str>, local: &str) {
        if let Some(parent) = self.open.last_mut() {
            parent.saw_child = true;
        }
        let field = (namespace == Some(self.namespace.as_str())).then(|| {
            self.fields.push((local.to_owned(), String::new()));
            self.fields.len() - 1
        });
        self.open.push(OpenElement {
            field,
            saw_child: false,
        });
    }

    /// The innermost open element closed.
    pub fn close_child(&mut self) {
        self.open.pop();
    }

    /// Character data at the current position.
    pub fn text(&mut self, text: &str) {
        let Some(current) = self.open.last() else {
            return;
        };
        if current.saw_child {
            return;
        }
        if let Some(index) = current.field
            && let Some((_, value)) = self.fields.get_mut(index)
        {
            value.push_str(text);
        }
    }

    /// Every occurrence of `name`, in document order.
    pub fn occurrences<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.fields
            .iter()
            .filter(move |(local, _)| local == name)
            .map(|(_, text)| text.as_str())
    }

    /// Classify the occurrences of `name`.
    #[must_use]
    pub fn lookup_field(&self, name: &str) -> FieldLookup<'_> {
        let mut occurrences = self.occurrences(name);
        match (occurrences.next(), occurrences.count()) {
            (None, _) => FieldLookup::Missing,
            (Some(first), 0) => FieldLookup::Unique(first),
            (Some(first), rest) => FieldLookup::Repeated {
                first,
                count: rest + 1,
            },
        }
    }

    /// Text of `name`, tolerating absence and repetition.
    ///
    /// A missing field yields an empty string; a repeated one yields its
    /// first occurrence. Both cases are logged as warnings.
    ///
    /// # Examples
    /// ```
    /// use plateypus_data::etl::RecordElement;
    ///
    /// let record = RecordElement::from_fields([
    ///     ("FarveTypeNavn", "Rød"),
    ///     ("DrivkraftTypeNavn", "Benzin"),
    ///     ("DrivkraftTypeNavn", "El"),
    /// ]);
    /// assert_eq!(record.field_text("FarveTypeNavn"), "Rød");
    /// assert_eq!(record.field_text("DrivkraftTypeNavn"), "Benzin");
    /// assert_eq!(record.field_text("KoeretoejMaerkeTypeNavn"), "");
    /// ```
    #[must_use]
    pub fn field_text(&self, name: &str) -> String {
        match self.lookup_field(name) {
            FieldLookup::Missing => {
                log::warn!("record has no {name} element; using an empty value");
                String::new()
            }
            FieldLookup::Unique(text) => text.to_owned(),
            FieldLookup::Repeated { first, count } => {
                log::warn!("record has {count} {name} elements; using the first");
                first.to_owned()
            }
        }
    }

    /// Raw markup captured for the record so far.
    #[must_use]
    pub fn raw_xml(&self) -> String {
        String::from_utf8_lossy(self.markup.get_ref()).into_owned()
    }
}
