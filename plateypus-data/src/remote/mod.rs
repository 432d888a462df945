//! Remote endpoints the synchronisation pipeline talks to.
//!
//! Discovery resolves where the register dump lives; the directory client
//! lists and downloads files from that location over FTP.

mod discovery;
mod error;
mod ftp;
mod types;

#[cfg(any(test, feature = "test-support"))]
mod test_support;
#[cfg(any(test, feature = "test-support"))]
pub use test_support::{
    StubConnector, StubDirectory, StubDiscovery, StubSession, block_on_for_tests,
    example_coordinates,
};

pub use discovery::{
    COORDINATES_PATTERN, DEFAULT_METADATA_URL, DEFAULT_USER_AGENT, DiscoveryClient,
    HttpDiscoveryClient,
};
pub use error::{ConnectionError, DiscoveryError, RemoteError, TransportError};
pub use ftp::{FtpConnector, FtpDirectory, RemoteConnector, RemoteDirectory};
pub use types::{ConnectionCoordinates, DOWNLOAD_CHUNK_SIZE, RemoteEntry, copy_in_chunks};

#[cfg(test)]
mod tests;
