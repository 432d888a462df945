//! FTP access to the directory holding the register dumps.

use std::io::{self, Write};

use suppaftp::FtpStream;
use suppaftp::types::FileType;

use super::types::copy_in_chunks;
use super::{ConnectionCoordinates, ConnectionError, RemoteEntry, RemoteError};

/// Opens sessions on a remote directory.
pub trait RemoteConnector {
    /// Session type returned by [`RemoteConnector::connect`].
    type Directory: RemoteDirectory;

    /// Log in and change to the working directory named by `coordinates`.
    fn connect(
        &self,
        coordinates: &ConnectionCoordinates,
    ) -> Result<Self::Directory, ConnectionError>;
}

/// An open session positioned in the dump directory.
pub trait RemoteDirectory {
    /// Every file in the working directory with its size and mtime.
    fn list(&mut self) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Stream `name` into `sink`, calling `progress` with the running chunk
    /// count. Returns the number of bytes written.
    fn download(
        &mut self,
        name: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64, RemoteError>;
}

/// [`RemoteConnector`] speaking plain FTP in binary mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpConnector;

impl RemoteConnector for FtpConnector {
    type Directory = FtpDirectory;

    fn connect(&self, coordinates: &ConnectionCoordinates) -> Result<FtpDirectory, ConnectionError> {
        let failed = |step: &'static str| {
            let host = coordinates.host.clone();
            move |err: suppaftp::FtpError| ConnectionError {
                host,
                step,
                source: io::Error::other(err),
            }
        };
        let stream = FtpStream::connect(coordinates.address()).map_err(failed("connect"))?;
        // From here on the session is owned by `FtpDirectory`, whose drop
        // sends QUIT even if a later step fails.
        let mut directory = FtpDirectory {
            stream: Some(stream),
        };
        let stream = directory.stream_mut().map_err(|source| ConnectionError {
            host: coordinates.host.clone(),
            step: "connect",
            source,
        })?;
        stream
            .login(&coordinates.user, &coordinates.password)
            .map_err(failed("log in"))?;
        stream.cwd(&coordinates.path).map_err(failed("change directory"))?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(failed("select binary mode"))?;
        log::info!(
            "connected to {} as {} in /{}",
            coordinates.host,
            coordinates.user,
            coordinates.path
        );
        Ok(directory)
    }
}

/// Open FTP session. Dropping it sends `QUIT`.
pub struct FtpDirectory {
    stream: Option<FtpStream>,
}

impl std::fmt::Debug for FtpDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpDirectory")
            .field("open", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl FtpDirectory {
    fn stream_mut(&mut self) -> io::Result<&mut FtpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "FTP session closed"))
    }

    /// End the session explicitly, reporting a failed `QUIT`.
    pub fn close(mut self) -> io::Result<()> {
        match self.stream.take() {
            Some(mut stream) => stream.quit().map_err(io::Error::other),
            None => Ok(()),
        }
    }
}

impl Drop for FtpDirectory {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take()
            && let Err(err) = stream.quit()
        {
            log::debug!("FTP QUIT failed while releasing session: {err}");
        }
    }
}

impl RemoteDirectory for FtpDirectory {
    fn list(&mut self) -> Result<Vec<RemoteEntry>, RemoteError> {
        let stream = self
            .stream_mut()
            .map_err(|source| RemoteError::List { source })?;
        let names = stream.nlst(None).map_err(|err| RemoteError::List {
            source: io::Error::other(err),
        })?;
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let stat_error = |err: suppaftp::FtpError| RemoteError::Stat {
                name: name.clone(),
                source: io::Error::other(err),
            };
            let modified = stream.mdtm(&name).map_err(stat_error)?.and_utc();
            let size = stream.size(&name).map_err(stat_error)?;
            entries.push(RemoteEntry {
                modified,
                size: u64::try_from(size).unwrap_or(u64::MAX),
                name,
            });
        }
        Ok(entries)
    }

    fn download(
        &mut self,
        name: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64),
    ) -> Result<u64, RemoteError> {
        let download_error = |source: io::Error| RemoteError::Download {
            name: name.to_owned(),
            source,
        };
        let stream = self.stream_mut().map_err(download_error)?;
        stream
            .retr(name, |reader| {
                copy_in_chunks(reader, sink, progress).map_err(suppaftp::FtpError::ConnectionError)
            })
            .map_err(|err| download_error(io::Error::other(err)))
    }
}
