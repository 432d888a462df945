//! One synchronisation run: discover, download, transform and load.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use plateypus_core::{CountryCode, VehicleStore, WatermarkStore};
use thiserror::Error;

use super::extract::{DiskSpace, ExtractError, Extraction, Extractor, FsDiskSpace};
use super::load::{LoadError, LoadReport, load_vehicles};
use super::transform::Transformer;
use crate::remote::{DiscoveryClient, RemoteConnector};

/// Per-run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Register to synchronise.
    pub country: CountryCode,
    /// Directory the dump is downloaded into.
    pub download_dir: Utf8PathBuf,
    /// Keep the downloaded archive after the run.
    pub keep_archive: bool,
}

impl SyncSettings {
    /// Settings for `country`, downloading into the system temporary
    /// directory and removing the archive afterwards.
    #[must_use]
    pub fn new(country: CountryCode) -> Self {
        let download_dir = Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .unwrap_or_else(|path| Utf8PathBuf::from(path.to_string_lossy().into_owned()));
        Self {
            country,
            download_dir,
            keep_archive: false,
        }
    }
}

/// How a run ended when nothing went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No dump newer than the stored watermark was found, or the remote
    /// side could not be reached. Nothing was written.
    NoNewerFile,
    /// A newer dump was downloaded but produced no vehicles. Nothing was
    /// written.
    NoEntities,
    /// The country's vehicles were replaced.
    Loaded {
        /// Vehicles removed.
        deleted: u64,
        /// Vehicles written.
        inserted: u64,
        /// Watermark recorded for the country.
        timestamp: DateTime<Utc>,
    },
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No transformer exists for the requested register.
    #[error("no register format is known for country {country}")]
    UnsupportedCountry {
        /// Requested country.
        country: CountryCode,
    },
    /// Locating or downloading the dump failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),
    /// Writing the new data failed.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// The collaborators of a synchronisation run.
pub struct SyncPipeline<Q, C> {
    discovery: Q,
    connector: C,
    settings: SyncSettings,
    disk: Box<dyn DiskSpace>,
}

impl<Q, C> std::fmt::Debug for SyncPipeline<Q, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncPipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<Q, C> SyncPipeline<Q, C>
where
    Q: DiscoveryClient,
    C: RemoteConnector,
{
    /// Assemble a pipeline.
    pub fn new(discovery: Q, connector: C, settings: SyncSettings) -> Self {
        Self {
            discovery,
            connector,
            settings,
            disk: Box::new(FsDiskSpace),
        }
    }

    /// Measure free space with `disk` instead of the filesystem.
    #[must_use]
    pub fn with_disk_space(mut self, disk: impl DiskSpace + 'static) -> Self {
        self.disk = Box::new(disk);
        self
    }

    /// Settings the pipeline runs with.
    #[must_use]
    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run one synchronisation against `store`.
    ///
    /// Discovery and connection failures end the run early with
    /// [`SyncOutcome::NoNewerFile`]; only extraction and load failures are
    /// errors. The downloaded archive is removed on every exit path unless
    /// [`SyncSettings::keep_archive`] is set.
    pub async fn extract_transform_load<S>(&self, store: &mut S) -> Result<SyncOutcome, SyncError>
    where
        S: VehicleStore + WatermarkStore + ?Sized,
    {
        let country = &self.settings.country;
        let transformer =
            Transformer::for_country(country).ok_or_else(|| SyncError::UnsupportedCountry {
                country: country.clone(),
            })?;

        let coordinates = match self.discovery.resolve().await {
            Ok(coordinates) => coordinates,
            Err(err) => {
                log::warn!("cannot locate the {country} register: {err}");
                log::info!("no newer file found");
                return Ok(SyncOutcome::NoNewerFile);
            }
        };
        let directory = match self.connector.connect(&coordinates) {
            Ok(directory) => directory,
            Err(err) => {
                log::warn!("cannot open the {country} register: {err}");
                log::info!("no newer file found");
                return Ok(SyncOutcome::NoNewerFile);
            }
        };

        let extraction = Extractor::new(
            directory,
            &*store,
            country.clone(),
            self.settings.download_dir.clone(),
        )
        .with_disk_space(self.disk.as_ref())
        .download_if_newer()?;
        let (archive_path, timestamp) = match extraction {
            Extraction::Newer {
                archive_path,
                timestamp,
            } => (archive_path, timestamp),
            Extraction::UpToDate { .. } => {
                log::info!("no newer file found");
                return Ok(SyncOutcome::NoNewerFile);
            }
        };
        let _archive = ArchiveGuard::new(&archive_path, self.settings.keep_archive);

        let vehicles = transformer.build_from_xml(&archive_path);
        if vehicles.is_empty() {
            log::warn!("{archive_path} produced no {country} vehicles; keeping existing data");
            return Ok(SyncOutcome::NoEntities);
        }

        let LoadReport { deleted, inserted } =
            load_vehicles(store, country, &vehicles, timestamp).map_err(|err| {
                log::error!("load of {} {country} vehicles failed: {err}", vehicles.len());
                err
            })?;
        Ok(SyncOutcome::Loaded {
            deleted,
            inserted,
            timestamp,
        })
    }
}

/// Removes the downloaded archive when the run ends.
struct ArchiveGuard<'a> {
    path: &'a Utf8Path,
    keep: bool,
}

impl<'a> ArchiveGuard<'a> {
    const fn new(path: &'a Utf8Path, keep: bool) -> Self {
        Self { path, keep }
    }
}

impl Drop for ArchiveGuard<'_> {
    fn drop(&mut self) {
        if self.keep {
            log::info!("keeping archive {}", self.path);
            return;
        }
        match plateypus_fs::remove_file_if_exists(self.path) {
            Ok(_) => log::debug!("removed archive {}", self.path),
            Err(err) => log::warn!("failed to remove archive {}: {err}", self.path),
        }
    }
}
