//! Incremental synchronisation of national vehicle registers.
//!
//! A run finds the newest dump on the register's FTP mirror, downloads it
//! only when it is newer than the stored watermark, streams the packed XML
//! into [`Vehicle`](plateypus_core::Vehicle) records and replaces the
//! country's partition in the store. The watermark is advanced last, so an
//! interrupted run is retried in full on the next invocation.

mod extract;
mod load;
mod pipeline;
mod staleness;
mod transform;

pub use extract::{
    DiskSpace, ExtractError, Extraction, Extractor, FsDiskSpace, expected_chunks, newest_entry,
};
pub use load::{LoadError, LoadReport, load_vehicles};
pub use pipeline::{SyncError, SyncOutcome, SyncPipeline, SyncSettings};
pub use staleness::is_newer;
pub use transform::{
    DANISH_RECORD_FORMAT, FieldLookup, NamespaceResolver, ParseError, ParseProgress,
    READ_CHUNK_SIZE, RecordElement, RecordFormat, RecordMapper, ResolvedName, Transformer,
    XmlArchive, map_danish_record, open_xml_stream,
};

#[cfg(test)]
mod tests;
