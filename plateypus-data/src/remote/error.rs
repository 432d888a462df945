//! Error types produced by the remote discovery and directory clients.

use std::io;

use thiserror::Error;

/// Transport-level errors encountered while issuing HTTP requests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description supplied by the server.
        message: String,
    },
    /// The request failed due to an I/O error.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// I/O error reported by the transport.
        source: io::Error,
    },
}

/// Reasons the connection coordinates could not be resolved.
///
/// Every variant is treated as "no newer file" by the pipeline; they stay
/// distinct so logs say which part of the catalog lookup broke.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The HTTP client could not be configured.
    #[error("failed to prepare discovery client: {detail}")]
    Setup {
        /// Description of the configuration failure.
        detail: String,
    },
    /// The catalog could not be fetched.
    #[error("metadata catalog is unreachable: {source}")]
    Unreachable {
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
    /// The catalog payload did not have the expected structure.
    #[error("metadata catalog at {url} has an unexpected shape: {detail}")]
    UnexpectedShape {
        /// Catalog URL.
        url: String,
        /// What was missing or malformed.
        detail: String,
    },
    /// The advertised resource URL does not look like FTP coordinates.
    #[error("resource URL advertised by {url} does not match the expected FTP pattern")]
    PatternMismatch {
        /// Catalog URL.
        url: String,
    },
}

/// Failure to open a session on the remote directory.
#[derive(Debug, Error)]
#[error("failed to {step} on {host}: {source}")]
pub struct ConnectionError {
    /// Host the session targeted.
    pub host: String,
    /// Session step that failed.
    pub step: &'static str,
    /// Protocol error reported by the server or socket.
    #[source]
    pub source: io::Error,
}

/// Errors raised while listing or downloading from an open directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    /// Listing the working directory failed.
    #[error("failed to list remote directory: {source}")]
    List {
        /// Protocol or socket error.
        #[source]
        source: io::Error,
    },
    /// Reading metadata for an entry failed.
    #[error("failed to stat remote entry {name}: {source}")]
    Stat {
        /// Remote file name.
        name: String,
        /// Protocol or socket error.
        #[source]
        source: io::Error,
    },
    /// Retrieving an entry failed part way.
    #[error("failed to download remote entry {name}: {source}")]
    Download {
        /// Remote file name.
        name: String,
        /// Protocol, socket or sink error.
        #[source]
        source: io::Error,
    },
}
