//! Finds the newest remote dump and downloads it when it is not yet loaded.

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use plateypus_core::{CountryCode, StoreError, WatermarkStore, minimum_timestamp};
use thiserror::Error;

use super::staleness::is_newer;
use crate::remote::{DOWNLOAD_CHUNK_SIZE, RemoteDirectory, RemoteEntry, RemoteError};

/// Measures free space where archives are downloaded.
pub trait DiskSpace {
    /// Bytes available to this process in `dir`.
    fn available(&self, dir: &Utf8Path) -> io::Result<u64>;
}

/// [`DiskSpace`] backed by the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDiskSpace;

impl DiskSpace for FsDiskSpace {
    fn available(&self, dir: &Utf8Path) -> io::Result<u64> {
        plateypus_fs::available_space(dir)
    }
}

/// Result of [`Extractor::download_if_newer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A newer dump was downloaded to `archive_path`.
    Newer {
        /// Local copy of the dump.
        archive_path: Utf8PathBuf,
        /// Remote modification time of the dump.
        timestamp: DateTime<Utc>,
    },
    /// Nothing newer than the stored watermark exists.
    UpToDate {
        /// Always [`minimum_timestamp`].
        timestamp: DateTime<Utc>,
    },
}

/// Errors raised while locating or downloading a dump.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The remote directory holds no files.
    #[error("remote directory is empty")]
    EmptyListing,
    /// Listing or downloading failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The stored watermark could not be read.
    #[error("failed to read the stored watermark: {0}")]
    Watermark(#[from] StoreError),
    /// The download directory cannot hold the dump.
    #[error("{file_name} needs {required} bytes but only {available} are free")]
    InsufficientSpace {
        /// Remote file that was not downloaded.
        file_name: String,
        /// Size of the remote file.
        required: u64,
        /// Free bytes in the download directory.
        available: u64,
    },
    /// Free space could not be measured.
    #[error("failed to measure free space in {path}: {source}")]
    FreeSpace {
        /// Download directory.
        path: Utf8PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
    /// The local copy could not be written.
    #[error("failed to write archive {path}: {source}")]
    WriteArchive {
        /// Local archive path.
        path: Utf8PathBuf,
        /// Filesystem error.
        #[source]
        source: io::Error,
    },
}

/// Number of [`DOWNLOAD_CHUNK_SIZE`] blocks a download of `size` bytes is
/// expected to take, rounded to the nearest whole block.
///
/// # Examples
/// ```
/// use plateypus_data::etl::expected_chunks;
/// use plateypus_data::remote::DOWNLOAD_CHUNK_SIZE;
///
/// let chunk = DOWNLOAD_CHUNK_SIZE as u64;
/// assert_eq!(expected_chunks(0), 0);
/// assert_eq!(expected_chunks(chunk / 2), 1);
/// assert_eq!(expected_chunks(chunk / 2 - 1), 0);
/// assert_eq!(expected_chunks(10 * chunk), 10);
/// ```
#[must_use]
pub fn expected_chunks(size: u64) -> u64 {
    let chunk = u64::try_from(DOWNLOAD_CHUNK_SIZE).unwrap_or(u64::MAX);
    size.saturating_add(chunk.div_euclid(2)).div_euclid(chunk)
}

/// Pick the most recently modified entry; later entries win ties.
#[must_use]
pub fn newest_entry(entries: Vec<RemoteEntry>) -> Option<RemoteEntry> {
    entries
        .into_iter()
        .reduce(|best, entry| if entry.modified >= best.modified { entry } else { best })
}

/// Downloads the newest dump for one country over an open remote session.
///
/// The session is owned by the extractor and released when it is dropped.
pub struct Extractor<'s, D, W: ?Sized> {
    directory: D,
    store: &'s W,
    country: CountryCode,
    download_dir: Utf8PathBuf,
    disk: &'s dyn DiskSpace,
}

impl<D, W: ?Sized> std::fmt::Debug for Extractor<'_, D, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("country", &self.country)
            .field("download_dir", &self.download_dir)
            .finish_non_exhaustive()
    }
}

impl<'s, D, W> Extractor<'s, D, W>
where
    D: RemoteDirectory,
    W: WatermarkStore + ?Sized,
{
    /// Create an extractor writing archives into `download_dir`.
    pub fn new(
        directory: D,
        store: &'s W,
        country: CountryCode,
        download_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            directory,
            store,
            country,
            download_dir: download_dir.into(),
            disk: &FsDiskSpace,
        }
    }

    /// Measure free space with `disk` instead of the filesystem.
    #[must_use]
    pub fn with_disk_space(mut self, disk: &'s dyn DiskSpace) -> Self {
        self.disk = disk;
        self
    }

    /// Download the newest dump if it is newer than the stored watermark,
    /// logging progress at debug level.
    pub fn download_if_newer(&mut self) -> Result<Extraction, ExtractError> {
        self.download_if_newer_with_progress(&mut |chunk, expected| {
            log::debug!("downloaded chunk {chunk} of about {expected}");
        })
    }

    /// As [`Self::download_if_newer`], reporting `(chunk, expected_chunks)`
    /// after each block.
    pub fn download_if_newer_with_progress(
        &mut self,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<Extraction, ExtractError> {
        let newest = newest_entry(self.directory.list()?).ok_or(ExtractError::EmptyListing)?;
        log::info!(
            "newest remote file is {} ({} bytes, modified {})",
            newest.name,
            newest.size,
            newest.modified
        );

        if !is_newer(self.store, &self.country, newest.modified)? {
            log::info!("{} data is up to date", self.country);
            return Ok(Extraction::UpToDate {
                timestamp: minimum_timestamp(),
            });
        }

        self.ensure_space(&newest)?;
        let archive_path = self.download_dir.join(local_name(&newest.name));
        self.download(&newest, &archive_path, progress)?;
        Ok(Extraction::Newer {
            archive_path,
            timestamp: newest.modified,
        })
    }

    fn ensure_space(&self, entry: &RemoteEntry) -> Result<(), ExtractError> {
        plateypus_fs::ensure_dir(&self.download_dir).map_err(|source| {
            ExtractError::WriteArchive {
                path: self.download_dir.clone(),
                source,
            }
        })?;
        let available =
            self.disk
                .available(&self.download_dir)
                .map_err(|source| ExtractError::FreeSpace {
                    path: self.download_dir.clone(),
                    source,
                })?;
        if available <= entry.size {
            return Err(ExtractError::InsufficientSpace {
                file_name: entry.name.clone(),
                required: entry.size,
                available,
            });
        }
        Ok(())
    }

    fn download(
        &mut self,
        entry: &RemoteEntry,
        archive_path: &Utf8Path,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<(), ExtractError> {
        let write_error = |source: io::Error| ExtractError::WriteArchive {
            path: archive_path.to_owned(),
            source,
        };
        let mut file = plateypus_fs::create_file(archive_path).map_err(write_error)?;
        let expected = expected_chunks(entry.size);
        log::info!("downloading {} to {archive_path}", entry.name);

        let outcome = self
            .directory
            .download(&entry.name, &mut file, &mut |chunk| progress(chunk, expected))
            .map_err(ExtractError::from)
            .and_then(|written| file.flush().map(|()| written).map_err(write_error));
        match outcome {
            Ok(written) => {
                if written != entry.size {
                    log::warn!(
                        "{} advertised {} bytes but {written} were downloaded",
                        entry.name,
                        entry.size
                    );
                }
                Ok(())
            }
            Err(err) => {
                drop(file);
                if let Err(cleanup) = plateypus_fs::remove_file_if_exists(archive_path) {
                    log::warn!("failed to remove partial archive {archive_path}: {cleanup}");
                }
                Err(err)
            }
        }
    }
}

/// Final path component of a remote name, so downloads stay inside the
/// download directory.
fn local_name(remote: &str) -> &str {
    Utf8Path::new(remote).file_name().unwrap_or(remote)
}
