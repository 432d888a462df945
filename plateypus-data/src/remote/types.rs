//! Plain values exchanged with the remote endpoints.

use std::{
    fmt,
    io::{self, Read, Write},
};

use chrono::{DateTime, Utc};

/// Size of each block streamed from the remote directory to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Where and how to log in to the remote directory.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionCoordinates {
    /// Login name.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Host name, optionally with `:port`.
    pub host: String,
    /// Working directory holding the dumps.
    pub path: String,
}

impl ConnectionCoordinates {
    /// Socket address to dial, defaulting to the FTP control port.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            self.host.clone()
        } else {
            format!("{}:21", self.host)
        }
    }
}

impl fmt::Debug for ConnectionCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCoordinates")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("path", &self.path)
            .finish()
    }
}

/// One file in the remote working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Modification time reported by the server.
    pub modified: DateTime<Utc>,
    /// Size in bytes.
    pub size: u64,
    /// File name relative to the working directory.
    pub name: String,
}

/// Copy `reader` into `sink` in [`DOWNLOAD_CHUNK_SIZE`] blocks.
///
/// `progress` receives the running chunk count after each block is written.
/// Returns the number of bytes copied.
///
/// # Examples
/// ```
/// use plateypus_data::remote::{DOWNLOAD_CHUNK_SIZE, copy_in_chunks};
///
/// let payload = vec![7_u8; DOWNLOAD_CHUNK_SIZE + 10];
/// let mut sink = Vec::new();
/// let mut ticks = Vec::new();
/// let copied = copy_in_chunks(&mut payload.as_slice(), &mut sink, &mut |n| ticks.push(n))
///     .expect("copy in memory");
/// assert_eq!(copied, payload.len() as u64);
/// assert_eq!(ticks, [1, 2]);
/// ```
pub fn copy_in_chunks(
    reader: &mut dyn Read,
    sink: &mut dyn Write,
    progress: &mut dyn FnMut(u64),
) -> io::Result<u64> {
    let mut buffer = vec![0_u8; DOWNLOAD_CHUNK_SIZE];
    let mut chunks = 0_u64;
    let mut total = 0_u64;
    loop {
        let filled = fill_chunk(reader, &mut buffer)?;
        if filled == 0 {
            return Ok(total);
        }
        let block = buffer.get(..filled).unwrap_or_default();
        sink.write_all(block)?;
        total = total.saturating_add(u64::try_from(filled).unwrap_or(u64::MAX));
        chunks += 1;
        progress(chunks);
    }
}

fn fill_chunk(reader: &mut dyn Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let Some(rest) = buffer.get_mut(filled..) else {
            break;
        };
        match reader.read(rest) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
