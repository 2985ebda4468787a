use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::copy::{copy_file, Copied};
use crate::error::TransferError;
use crate::fs::Filesystem;
use crate::sink::Sinks;
use crate::stats::Statistics;
use crate::timestamp::parse_timestamp;

/// Day-of-year directory, `YYYY_DDD`.
pub const DAY_DIR_PATTERN: &str = "????_???";
/// SFL log files.
pub const LOG_FILE_PATTERN: &str = "*.sfl";
/// Uncompressed EVT capture files.
pub const CAPTURE_FILE_PATTERN: &str = "????-??-??T??-??-??[-+]??-??";
/// Compressed EVT capture files.
pub const CAPTURE_GZ_FILE_PATTERN: &str = "????-??-??T??-??-??[-+]??-??.gz";

/// One transfer session between a source and a destination filesystem.
///
/// The session owns both filesystems and closes them in [`Transfer::close`].
pub struct Transfer {
    src_fs: Box<dyn Filesystem>,
    src_root: PathBuf,
    dst_fs: Box<dyn Filesystem>,
    dst_root: PathBuf,
    earliest: Option<DateTime<Utc>>,
    sinks: Sinks,
    rng: StdRng,
    stats: Statistics,
}

impl Transfer {
    pub fn new(
        src_fs: Box<dyn Filesystem>,
        src_root: impl Into<PathBuf>,
        dst_fs: Box<dyn Filesystem>,
        dst_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            src_fs,
            src_root: src_root.into(),
            dst_fs,
            dst_root: dst_root.into(),
            earliest: None,
            sinks: Sinks::default(),
            rng: StdRng::from_entropy(),
            stats: Statistics::new(),
        }
    }

    /// Only transfer files whose name timestamp is at or after `earliest`.
    pub fn with_earliest(mut self, earliest: Option<DateTime<Utc>>) -> Self {
        self.earliest = earliest;
        self
    }

    pub fn with_sinks(mut self, sinks: Sinks) -> Self {
        self.sinks = sinks;
        self
    }

    /// Random source for temporary file names.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn src_root(&self) -> &Path {
        &self.src_root
    }

    pub fn dst_root(&self) -> &Path {
        &self.dst_root
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Copies every SFL file from source to destination, overwriting what is
    /// there. Files are identified as `<root>/<day dir>/<name>.sfl`.
    pub fn copy_log_files(&mut self) -> Result<(), TransferError> {
        let pattern = day_pattern(&self.src_root, LOG_FILE_PATTERN);
        let src_files = glob(self.src_fs.as_ref(), &pattern)?;
        self.stats.add_files_found(src_files.len());
        self.sinks
            .info(&format!("found {} source SFL files", src_files.len()));

        let files = self.filter_earliest(src_files);
        for path in files {
            self.copy_one(&path, false)?;
        }
        Ok(())
    }

    /// Copies EVT files that are not yet at the destination, gzipping them on
    /// the way unless they already are. The most recent EVT file by name is
    /// never copied since it may still be open for writing, and nothing is
    /// copied unless at least two EVT files exist.
    pub fn copy_capture_files(&mut self) -> Result<(), TransferError> {
        let mut src_files = glob(
            self.src_fs.as_ref(),
            &day_pattern(&self.src_root, CAPTURE_FILE_PATTERN),
        )?;
        src_files.extend(glob(
            self.src_fs.as_ref(),
            &day_pattern(&self.src_root, CAPTURE_GZ_FILE_PATTERN),
        )?);
        self.stats.add_files_found(src_files.len());
        self.sinks
            .info(&format!("found {} source EVT files", src_files.len()));
        if src_files.len() < 2 {
            return Ok(());
        }

        // The last name after a string sort is the newest file. Day
        // directories sort chronologically too, so sort whole paths.
        src_files.sort();
        if let Some(latest) = src_files.pop() {
            self.stats.add_withheld();
            self.sinks
                .debug(&format!("withholding most recent EVT file {}", latest.display()));
        }

        let present = self.present_captures()?;
        let candidates = src_files.len();
        let src_files: Vec<PathBuf> = src_files
            .into_iter()
            .filter(|path| {
                capture_key(path).map_or(true, |key| !present.contains(&key))
            })
            .collect();
        let duplicates = candidates - src_files.len();
        self.stats.add_duplicates(duplicates);
        self.sinks.info(&format!(
            "skipped {} duplicates and the most recent EVT file",
            duplicates
        ));

        let files = self.filter_earliest(src_files);
        for path in files {
            self.copy_one(&path, true)?;
        }
        Ok(())
    }

    /// Copies a single file into the matching day directory under the
    /// destination root.
    pub fn copy_file(&mut self, path: &Path, compress: bool) -> Result<Copied, TransferError> {
        copy_file(
            self.src_fs.as_ref(),
            self.dst_fs.as_ref(),
            &self.dst_root,
            path,
            compress,
            &mut self.rng,
            &self.sinks,
        )
    }

    /// Closes both filesystems. Both are always attempted; a source-side
    /// error wins over a destination-side one.
    pub fn close(&mut self) -> Result<(), TransferError> {
        let src = self.src_fs.close();
        let dst = self.dst_fs.close();
        if let Err(source) = src {
            if let Err(e) = &dst {
                self.sinks
                    .error(&format!("could not close destination filesystem: {}", e));
            }
            return Err(TransferError::Close {
                side: "source",
                source,
            });
        }
        dst.map_err(|source| TransferError::Close {
            side: "destination",
            source,
        })
    }

    fn copy_one(&mut self, path: &Path, compress: bool) -> Result<(), TransferError> {
        let copied = self.copy_file(path, compress)?;
        self.stats.add_file_copied(copied.bytes);
        self.sinks.info(&format!("copied {}", path.display()));
        Ok(())
    }

    /// Base names of capture files already at the destination, with any
    /// `.gz` removed.
    fn present_captures(&self) -> Result<HashSet<String>, TransferError> {
        let mut dst_files = glob(
            self.dst_fs.as_ref(),
            &day_pattern(&self.dst_root, CAPTURE_FILE_PATTERN),
        )?;
        dst_files.extend(glob(
            self.dst_fs.as_ref(),
            &day_pattern(&self.dst_root, CAPTURE_GZ_FILE_PATTERN),
        )?);
        Ok(dst_files.iter().filter_map(|p| capture_key(p)).collect())
    }

    /// Drops files whose name timestamp is before the cutoff. Names without
    /// a timestamp are kept.
    fn filter_earliest(&mut self, files: Vec<PathBuf>) -> Vec<PathBuf> {
        let Some(earliest) = self.earliest else {
            return files;
        };
        let before = files.len();
        let kept: Vec<PathBuf> = files
            .into_iter()
            .filter(|path| match parse_timestamp(&path.to_string_lossy()) {
                Ok(ts) => {
                    let keep = ts.with_timezone(&Utc) >= earliest;
                    if !keep {
                        self.sinks
                            .debug(&format!("{} is before {}", path.display(), earliest));
                    }
                    keep
                }
                Err(_) => true,
            })
            .collect();
        self.stats.add_too_early(before - kept.len());
        kept
    }
}

/// `<root>/????_???/<file pattern>` as a string.
fn day_pattern(root: &Path, file_pattern: &str) -> String {
    root.join(DAY_DIR_PATTERN)
        .join(file_pattern)
        .to_string_lossy()
        .into_owned()
}

fn glob(fs: &dyn Filesystem, pattern: &str) -> Result<Vec<PathBuf>, TransferError> {
    fs.glob(pattern).map_err(|source| TransferError::Glob {
        pattern: pattern.to_string(),
        source,
    })
}

/// File name with a trailing `.gz` removed, so compressed and plain copies
/// of a capture file compare equal.
fn capture_key(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    Some(name.strip_suffix(".gz").unwrap_or(name).to_string())
}
