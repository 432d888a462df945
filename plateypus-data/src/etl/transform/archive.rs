//! Access to the single XML document packed inside a register dump.

use std::io::{self, BufRead, BufReader, Read};

use camino::Utf8Path;
use cap_std::fs_utf8::File;
use zip::ZipArchive;
use zip::result::ZipError;

/// Size of the blocks pulled from the archive entry.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Progress of a transformation, reported once per block read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseProgress {
    /// Blocks read so far.
    pub chunks: u64,
    /// Uncompressed bytes consumed so far.
    pub bytes: u64,
}

/// A ZIP archive known to hold exactly one entry.
pub struct XmlArchive {
    archive: ZipArchive<File>,
    entry_name: String,
}

impl std::fmt::Debug for XmlArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlArchive")
            .field("entry_name", &self.entry_name)
            .finish_non_exhaustive()
    }
}

/// Open `path` as a single-document archive.
///
/// Returns `None`, after logging why, when the file cannot be read, is not a
/// ZIP archive or holds anything other than exactly one entry.
pub fn open_xml_stream(path: &Utf8Path) -> Option<XmlArchive> {
    let file = match plateypus_fs::open_file(path) {
        Ok(file) => file,
        Err(err) => {
            log::error!("cannot open archive {path}: {err}");
            return None;
        }
    };
    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(err) => {
            log::error!("{path} is not a readable ZIP archive: {err}");
            return None;
        }
    };
    if archive.len() != 1 {
        log::error!(
            "{path} holds {} entries; expected exactly one XML document",
            archive.len()
        );
        return None;
    }
    let entry_name = match archive.by_index(0) {
        Ok(entry) => entry.name().to_owned(),
        Err(err) => {
            log::error!("cannot read the entry in {path}: {err}");
            return None;
        }
    };
    Some(XmlArchive {
        archive,
        entry_name,
    })
}

impl XmlArchive {
    /// Name of the packed document.
    #[must_use]
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Buffered reader over the decompressed document.
    ///
    /// `progress` is called after each block pulled from the archive.
    pub fn stream<'a>(
        &'a mut self,
        progress: &'a mut dyn FnMut(ParseProgress),
    ) -> Result<Box<dyn BufRead + 'a>, ZipError> {
        let entry = self.archive.by_index(0)?;
        let counted = ProgressReader {
            inner: entry,
            progress,
            state: ParseProgress::default(),
        };
        Ok(Box::new(BufReader::with_capacity(READ_CHUNK_SIZE, counted)))
    }
}

struct ProgressReader<'a, R> {
    inner: R,
    progress: &'a mut dyn FnMut(ParseProgress),
    state: ParseProgress,
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        if read > 0 {
            self.state.chunks += 1;
            self.state.bytes = self
                .state
                .bytes
                .saturating_add(u64::try_from(read).unwrap_or(u64::MAX));
            (self.progress)(self.state);
        }
        Ok(read)
    }
}
