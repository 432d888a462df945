//! Filesystem helpers for download directories, archives and database files.
//!
//! Paths are UTF-8 (`camino`) and every mutation goes through a `cap-std`
//! directory handle opened with ambient authority on the nearest root, so
//! callers never juggle platform prefixes themselves.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// Open `path` for reading.
pub fn open_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Create (or truncate) `path` for writing, creating missing parent
/// directories first.
pub fn create_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    ensure_parent_dir(path)?;
    let (dir, name) = parent_dir_and_name(path)?;
    dir.create(name.as_str())
}

/// Open `path` for appending, creating it and any missing parent
/// directories first.
pub fn append_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    ensure_parent_dir(path)?;
    let (dir, name) = parent_dir_and_name(path)?;
    let mut options = fs_utf8::OpenOptions::new();
    options.create(true).append(true);
    dir.open_with(name.as_str(), &options)
}

/// Whether `path` names a regular file. Missing paths are an error.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = parent_dir_and_name(path)?;
    dir.metadata(name.as_str()).map(|meta| meta.is_file())
}

/// Remove `path`, returning `false` when it was already gone.
pub fn remove_file_if_exists(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = parent_dir_and_name(path)?;
    match dir.remove_file(name.as_str()) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Ensure the directory `path` exists.
pub fn ensure_dir(path: &Utf8Path) -> io::Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    let (base, relative) = split_at_root(path)?;
    if relative.as_os_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Bytes available to an unprivileged user on the volume holding `path`.
pub fn available_space(path: &Utf8Path) -> io::Result<u64> {
    fs2::available_space(path)
}

fn parent_dir_and_name(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} has no file name")))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Anchor a relative `path` at the current directory. Directory handles
/// refuse `..` that climbs above them, so splitting must start from a root.
fn absolute(path: &Utf8Path) -> io::Result<Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let joined = std::path::absolute(path)?;
    Utf8PathBuf::from_path_buf(joined)
        .map_err(|joined| io::Error::other(format!("{} is not UTF-8", joined.display())))
}

/// Split `path` into a handle on its root and the remaining relative suffix.
fn split_at_root(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let anchored = absolute(path)?;
    let path = anchored.as_path();
    let std_path = path.as_std_path();
    let (base, relative) = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = path
                .strip_prefix(&base)
                .or_else(|_| path.strip_prefix(prefix))
                .map_err(|_| io::Error::other(format!("cannot strip {prefix} from {path}")))?;
            (base, relative.to_owned())
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = path
                .strip_prefix(&base)
                .map_err(|_| io::Error::other(format!("cannot strip root from {path}")))?;
            (base, relative.to_owned())
        }
        _ => (Utf8PathBuf::from("."), path.to_owned()),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}
