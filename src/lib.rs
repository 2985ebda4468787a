//! SeaFlow transfer library
//!
//! Copies SeaFlow instrument files from a source to a destination, either of
//! which may be local disk or an SFTP server. SFL log files are always copied
//! in full. EVT capture files are copied incrementally and gzipped, skipping
//! files already at the destination and the newest file, which the
//! instrument may still be writing.

pub mod args;
pub mod copy;
pub mod error;
pub mod fs;
pub mod sftp;
pub mod sink;
pub mod stats;
pub mod timestamp;
pub mod utils;

mod engine;

pub use args::{Cli, Endpoint};
pub use copy::{Copied, CopyStep};
pub use engine::{
    Transfer, CAPTURE_FILE_PATTERN, CAPTURE_GZ_FILE_PATTERN, DAY_DIR_PATTERN, LOG_FILE_PATTERN,
};
pub use error::TransferError;
pub use fs::{FileHandle, Filesystem, LocalFs};
pub use sftp::{Credential, HostKeyCheck, SftpConfig, SftpFs};
pub use sink::{LogSink, MemorySink, NullSink, Sinks, TracingSink};
pub use stats::Statistics;
pub use timestamp::{parse_timestamp, TimestampError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "seaflow-transfer";
