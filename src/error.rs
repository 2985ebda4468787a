use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::copy::CopyStep;

/// Errors that abort a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The SSH session could not be set up or authenticated.
    #[error("could not connect to {address}: {message}")]
    Connection {
        /// `host:port` that was dialled.
        address: String,
        /// What went wrong.
        message: String,
    },
    /// Listing files for a pattern failed.
    #[error("could not glob {pattern}: {source}")]
    Glob {
        /// Pattern being expanded.
        pattern: String,
        source: io::Error,
    },
    /// A destination day directory could not be created.
    #[error("error while copying {file}: could not create dir {path}: {source}")]
    Directory {
        /// Directory that failed.
        path: PathBuf,
        /// Source file whose copy needed the directory.
        file: PathBuf,
        source: io::Error,
    },
    /// One step of copying a single file failed.
    #[error("error while copying {path}: could not {step}: {source}")]
    Copy {
        /// Source file being copied.
        path: PathBuf,
        /// Step that failed.
        step: CopyStep,
        source: io::Error,
    },
    /// Closing a filesystem handle failed.
    #[error("could not close {side} filesystem: {source}")]
    Close {
        /// `"source"` or `"destination"`.
        side: &'static str,
        source: io::Error,
    },
}

impl TransferError {
    /// Source path the error refers to, if it is tied to a single file.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            TransferError::Copy { path, .. } => Some(path),
            TransferError::Directory { file, .. } => Some(file),
            _ => None,
        }
    }
}
