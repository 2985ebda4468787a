use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::{Compression, GzBuilder};
use rand::Rng;

use crate::error::TransferError;
use crate::fs::Filesystem;
use crate::sink::Sinks;
use crate::utils::temp_name;

const BUFFER_SIZE: usize = 64 * 1024;

/// The stage of a single-file copy, used to describe failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStep {
    Open,
    Stat,
    Create,
    Write,
    Compress,
    Flush,
    SetTimes,
    Rename,
}

impl fmt::Display for CopyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CopyStep::Open => "open input file",
            CopyStep::Stat => "stat input file",
            CopyStep::Create => "create output file",
            CopyStep::Write => "copy data",
            CopyStep::Compress => "copy and gzip data",
            CopyStep::Flush => "flush and close output file",
            CopyStep::SetTimes => "update mtime for output file",
            CopyStep::Rename => "perform final rename",
        };
        f.write_str(text)
    }
}

/// Result of a successful copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Copied {
    pub destination: PathBuf,
    pub bytes: u64,
}

/// Where a source file lands under `dst_root`.
///
/// Returns the final path, the temporary path, and whether the data will be
/// gzipped (never for a source that already ends in `.gz`).
pub fn destination_paths<R: Rng>(
    dst_root: &Path,
    path: &Path,
    compress: bool,
    rng: &mut R,
) -> io::Result<(PathBuf, PathBuf, bool)> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid(path, "has no usable file name"))?;
    let day_dir = path
        .parent()
        .and_then(Path::file_name)
        .ok_or_else(|| invalid(path, "has no parent directory"))?;

    let compress = compress && !filename.ends_with(".gz");
    let outdir = dst_root.join(day_dir);
    let mut outpath = outdir.join(filename);
    let mut temppath = outdir.join(temp_name(rng, filename));
    if compress {
        outpath.as_mut_os_string().push(".gz");
        temppath.as_mut_os_string().push(".gz");
    }
    Ok((outpath, temppath, compress))
}

fn invalid(path: &Path, what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{} {}", path.display(), what),
    )
}

fn gzip_mtime(mtime: SystemTime) -> u32 {
    mtime
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u32::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}

/// Copies `path` from `src_fs` into `<dst_root>/<day dir>/` on `dst_fs`.
///
/// The data is written to a temporary file that no transfer pattern matches,
/// stamped with the source modification time, and only then renamed into
/// place. On failure the temporary file is left behind.
pub fn copy_file<R: Rng>(
    src_fs: &dyn Filesystem,
    dst_fs: &dyn Filesystem,
    dst_root: &Path,
    path: &Path,
    compress: bool,
    rng: &mut R,
    sinks: &Sinks,
) -> Result<Copied, TransferError> {
    let fail = |step: CopyStep| {
        move |source: io::Error| TransferError::Copy {
            path: path.to_path_buf(),
            step,
            source,
        }
    };

    let (outpath, temppath, compress) =
        destination_paths(dst_root, path, compress, rng).map_err(fail(CopyStep::Open))?;
    let outdir = outpath.parent().unwrap_or(dst_root);

    // Make sure dir tree is ready to go
    dst_fs
        .create_dir_all(outdir)
        .map_err(|source| TransferError::Directory {
            path: outdir.to_path_buf(),
            file: path.to_path_buf(),
            source,
        })?;

    let mut input = src_fs.open(path).map_err(fail(CopyStep::Open))?;
    let mtime = input.modified().map_err(fail(CopyStep::Stat))?;

    sinks.debug(&format!("writing {} via {}", path.display(), temppath.display()));
    let output = dst_fs.create(&temppath).map_err(fail(CopyStep::Create))?;
    let mut output = BufWriter::with_capacity(BUFFER_SIZE, output);

    let bytes = if compress {
        let filename = outpath
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut encoder = GzBuilder::new()
            .filename(filename)
            .mtime(gzip_mtime(mtime))
            .write(&mut output, Compression::default());
        let bytes = io::copy(&mut input, &mut encoder).map_err(fail(CopyStep::Compress))?;
        encoder.finish().map_err(fail(CopyStep::Compress))?;
        bytes
    } else {
        io::copy(&mut input, &mut output).map_err(fail(CopyStep::Write))?
    };
    drop(input);

    output.flush().map_err(fail(CopyStep::Flush))?;
    let mut output = output
        .into_inner()
        .map_err(|e| fail(CopyStep::Flush)(e.into_error()))?;
    output.finish().map_err(fail(CopyStep::Flush))?;
    drop(output);

    dst_fs
        .set_times(&temppath, SystemTime::now(), mtime)
        .map_err(fail(CopyStep::SetTimes))?;

    dst_fs
        .rename(&temppath, &outpath)
        .map_err(fail(CopyStep::Rename))?;
    sinks.debug(&format!("renamed {} to {}", temppath.display(), outpath.display()));

    Ok(Copied {
        destination: outpath,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn destination_keeps_day_dir_and_name() {
        let mut rng = StdRng::seed_from_u64(3);
        let (out, temp, gz) = destination_paths(
            Path::new("/dst"),
            Path::new("/src/2016_133/a.sfl"),
            false,
            &mut rng,
        )
        .unwrap();
        assert_eq!(out, PathBuf::from("/dst/2016_133/a.sfl"));
        assert_eq!(temp.parent(), Some(Path::new("/dst/2016_133")));
        assert!(!gz);
    }

    #[test]
    fn destination_adds_gz_when_compressing() {
        let mut rng = StdRng::seed_from_u64(3);
        let (out, temp, gz) = destination_paths(
            Path::new("/dst"),
            Path::new("/src/2016_133/2016-05-12T17-00-02-00-00"),
            true,
            &mut rng,
        )
        .unwrap();
        assert_eq!(out, PathBuf::from("/dst/2016_133/2016-05-12T17-00-02-00-00.gz"));
        assert!(temp.to_string_lossy().ends_with("_.gz"));
        assert!(gz);
    }

    #[test]
    fn destination_never_double_compresses() {
        let mut rng = StdRng::seed_from_u64(3);
        let (out, _, gz) = destination_paths(
            Path::new("/dst"),
            Path::new("/src/2016_133/2016-05-12T17-00-02-00-00.gz"),
            true,
            &mut rng,
        )
        .unwrap();
        assert_eq!(out, PathBuf::from("/dst/2016_133/2016-05-12T17-00-02-00-00.gz"));
        assert!(!gz);
    }

    #[test]
    fn gzip_mtime_is_unix_seconds() {
        let t = UNIX_EPOCH + std::time::Duration::from_secs(1_463_072_402);
        assert_eq!(gzip_mtime(t), 1_463_072_402);
        assert_eq!(gzip_mtime(UNIX_EPOCH), 0);
    }

    #[test]
    fn step_names_read_as_sentences() {
        assert_eq!(CopyStep::Rename.to_string(), "perform final rename");
        assert_eq!(CopyStep::Create.to_string(), "create output file");
    }
}
