//! In-memory discovery and directory doubles for pipeline tests.

use std::cell::Cell;
use std::future::Future;
use std::io::{self, Write};
use std::rc::Rc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    ConnectionCoordinates, ConnectionError, DiscoveryClient, DiscoveryError, RemoteConnector,
    RemoteDirectory, RemoteEntry, RemoteError, copy_in_chunks,
};

/// Run `future` to completion on a single-threaded runtime.
pub fn block_on_for_tests<F: Future>(future: F) -> F::Output {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(future),
        Err(err) => panic!("failed to build test runtime: {err}"),
    }
}

/// Coordinates of a fictitious register mirror.
#[must_use]
pub fn example_coordinates() -> ConnectionCoordinates {
    ConnectionCoordinates {
        user: "dmr".into(),
        password: "secret".into(),
        host: "ftp.example.dk".into(),
        path: "ESStatistikListeModtag".into(),
    }
}

/// [`DiscoveryClient`] returning canned coordinates, or failing.
#[derive(Debug, Clone)]
pub struct StubDiscovery {
    coordinates: Option<ConnectionCoordinates>,
}

impl StubDiscovery {
    /// Resolve to [`example_coordinates`].
    #[must_use]
    pub fn reachable() -> Self {
        Self {
            coordinates: Some(example_coordinates()),
        }
    }

    /// Fail every resolution as if the catalog were down.
    #[must_use]
    pub fn unreachable() -> Self {
        Self { coordinates: None }
    }
}

#[async_trait(?Send)]
impl DiscoveryClient for StubDiscovery {
    async fn resolve(&self) -> Result<ConnectionCoordinates, DiscoveryError> {
        self.coordinates
            .clone()
            .ok_or_else(|| DiscoveryError::Unreachable {
                source: super::TransportError::Network {
                    url: "http://catalog.invalid/".into(),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "stub catalog down"),
                },
            })
    }
}

/// In-memory directory of named files with fixed modification times.
#[derive(Debug, Clone, Default)]
pub struct StubDirectory {
    files: Vec<(RemoteEntry, Vec<u8>)>,
    downloads: Rc<Cell<usize>>,
    open_sessions: Rc<Cell<usize>>,
}

impl StubDirectory {
    /// Add a file; its advertised size is the payload length.
    #[must_use]
    pub fn with_file(
        mut self,
        name: impl Into<String>,
        modified: DateTime<Utc>,
        payload: Vec<u8>,
    ) -> Self {
        let entry = RemoteEntry {
            modified,
            size: u64::try_from(payload.len()).unwrap_or(u64::MAX),
            name: name.into(),
        };
        self.files.push((entry, payload));
        self
    }

    /// Add a file advertising `size` bytes without holding them.
    #[must_use]
    pub fn with_listed_file(
        mut self,
        name: impl Into<String>,
        modified: DateTime<Utc>,
        size: u64,
    ) -> Self {
        let entry = RemoteEntry {
            modified,
            size,
            name: name.into(),
        };
        self.files.push((entry, Vec::new()));
        self
    }

    /// Number of downloads served so far, across clones.
    #[must_use]
    pub fn downloads(&self) -> usize {
        self.downloads.get()
    }

    /// Sessions handed out by a [`StubConnector`] and not yet dropped.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.get()
    }
}

impl RemoteDirectory for StubDirectory {
    fn list(&mut self) -> Result<Vec<RemoteEntry>, RemoteError> {
        Ok(self.files.iter().map(|(entry, _)| entry.clone()).collect())
    }

    fn download(
        &mut self,
        name: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64, RemoteError> {
        let (_, payload) = self
            .files
            .iter()
            .find(|(entry, _)| entry.name == name)
            .ok_or_else(|| RemoteError::Download {
                name: name.to_owned(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such remote file"),
            })?;
        self.downloads.set(self.downloads.get() + 1);
        copy_in_chunks(&mut payload.as_slice(), sink, progress).map_err(|source| {
            RemoteError::Download {
                name: name.to_owned(),
                source,
            }
        })
    }
}

/// Session on a [`StubDirectory`] that tracks when it is released.
#[derive(Debug)]
pub struct StubSession {
    directory: StubDirectory,
}

impl Drop for StubSession {
    fn drop(&mut self) {
        let open = &self.directory.open_sessions;
        open.set(open.get().saturating_sub(1));
    }
}

impl RemoteDirectory for StubSession {
    fn list(&mut self) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.directory.list()
    }

    fn download(
        &mut self,
        name: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64, RemoteError> {
        self.directory.download(name, sink, progress)
    }
}

/// [`RemoteConnector`] handing out sessions on a shared [`StubDirectory`].
#[derive(Debug, Clone)]
pub struct StubConnector {
    directory: StubDirectory,
    refuse: bool,
}

impl StubConnector {
    /// Connect successfully to `directory`.
    #[must_use]
    pub fn new(directory: StubDirectory) -> Self {
        Self {
            directory,
            refuse: false,
        }
    }

    /// Refuse every connection attempt.
    #[must_use]
    pub fn refusing() -> Self {
        Self {
            directory: StubDirectory::default(),
            refuse: true,
        }
    }
}

impl RemoteConnector for StubConnector {
    type Directory = StubSession;

    fn connect(
        &self,
        coordinates: &ConnectionCoordinates,
    ) -> Result<Self::Directory, ConnectionError> {
        if self.refuse {
            return Err(ConnectionError {
                host: coordinates.host.clone(),
                step: "connect",
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "stub refused"),
            });
        }
        let open = &self.directory.open_sessions;
        open.set(open.get() + 1);
        Ok(StubSession {
            directory: self.directory.clone(),
        })
    }
}
