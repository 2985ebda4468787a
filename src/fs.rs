//! Filesystem abstraction shared by the local and SFTP backends.
//!
//! The copy engine and the transfer orchestrator only ever talk to
//! [`Filesystem`], so either side of a transfer can be local disk or a remote
//! SFTP session.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;

/// An open file on either backend.
pub trait FileHandle: Read + Write {
    /// Modification time of the underlying file.
    fn modified(&mut self) -> io::Result<SystemTime>;

    /// Flushes buffered data and closes the handle, reporting any error the
    /// close itself produces.
    fn finish(&mut self) -> io::Result<()>;
}

/// A place SeaFlow files live.
pub trait Filesystem {
    /// Opens an existing file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileHandle>>;

    /// Creates (or truncates) a file for writing.
    fn create(&self, path: &Path) -> io::Result<Box<dyn FileHandle>>;

    /// Creates `path` and all missing parents. Existing directories are fine.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Returns paths matching a shell pattern, in sorted order. Supports `*`,
    /// `?` and bracket classes. No matches is an empty list, not an error.
    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>>;

    /// Renames `from` to `to`, replacing `to` if it exists.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Sets access and modification times.
    fn set_times(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()>;

    /// Releases the backend. Further calls are not expected to succeed.
    fn close(&mut self) -> io::Result<()>;
}

impl FileHandle for File {
    fn modified(&mut self) -> io::Result<SystemTime> {
        self.metadata()?.modified()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

/// Host filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        LocalFs
    }
}

impl Filesystem for LocalFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        Ok(Box::new(File::open(path)?))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        Ok(Box::new(File::create(path)?))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let paths = glob::glob(pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let mut matches = Vec::new();
        for entry in paths {
            matches.push(entry.map_err(glob::GlobError::into_error)?);
        }
        Ok(matches)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn set_times(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()> {
        filetime::set_file_times(
            path,
            FileTime::from_system_time(atime),
            FileTime::from_system_time(mtime),
        )
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
