//! Shared fixtures and filesystem doubles for integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::fixture;
use seaflow_transfer::{FileHandle, Filesystem, LocalFs, Sinks, Transfer};
use tempfile::TempDir;

/// Source and destination roots inside one temporary directory.
pub struct Roots {
    _tmp: TempDir,
    pub src: PathBuf,
    pub dst: PathBuf,
}

impl Roots {
    pub fn src_file(&self, rel: &str) -> PathBuf {
        self.src.join(rel)
    }

    pub fn dst_file(&self, rel: &str) -> PathBuf {
        self.dst.join(rel)
    }

    /// Creates `<src>/<rel>` with `text`, creating the day directory.
    pub fn make_src(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.src_file(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        make_file(&path, text);
        path
    }

    pub fn transfer(&self) -> Transfer {
        self.transfer_with(Box::new(LocalFs::new()))
    }

    pub fn transfer_with(&self, dst_fs: Box<dyn Filesystem>) -> Transfer {
        Transfer::new(Box::new(LocalFs::new()), &self.src, dst_fs, &self.dst)
            .with_sinks(Sinks::silent())
            .with_rng(StdRng::seed_from_u64(42))
    }
}

#[fixture]
pub fn roots() -> Roots {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir(&src).unwrap();
    let dst = tmp.path().join("dst");
    Roots { _tmp: tmp, src, dst }
}

/// Writes `text` to `path` and sets its mtime back one second so gzip
/// header and filesystem times can be told apart from "now".
pub fn make_file(path: &Path, text: &str) {
    fs::write(path, text).unwrap();
    let back = mtime(path) - Duration::from_secs(1);
    filetime::set_file_times(
        path,
        FileTime::from_system_time(back),
        FileTime::from_system_time(back),
    )
    .unwrap();
}

/// Writes `text` gzipped to `path`, with the header and filesystem mtimes
/// one second in the past.
pub fn make_file_gz(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let back = SystemTime::now() - Duration::from_secs(1);
    let secs = back
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let file = fs::File::create(path).unwrap();
    let mut gz = GzBuilder::new()
        .mtime(secs as u32)
        .write(file, Compression::default());
    gz.write_all(text.as_bytes()).unwrap();
    gz.finish().unwrap();
    filetime::set_file_times(
        path,
        FileTime::from_system_time(back),
        FileTime::from_system_time(back),
    )
    .unwrap();
}

pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

pub fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs()
}

pub fn read_file(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

pub fn read_file_gz(path: &Path) -> String {
    let mut text = String::new();
    GzDecoder::new(fs::File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text
}

/// Header mtime and file name of a gzip file.
pub fn gz_header(path: &Path) -> (u32, Option<String>) {
    let decoder = GzDecoder::new(fs::File::open(path).unwrap());
    let header = decoder.header().unwrap();
    (
        header.mtime(),
        header
            .filename()
            .map(|n| String::from_utf8_lossy(n).into_owned()),
    )
}

/// All file names anywhere under `dir`, sorted.
pub fn names_under(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(days) = fs::read_dir(dir) {
        for day in days {
            let day = day.unwrap().path();
            for entry in fs::read_dir(&day).unwrap() {
                names.push(entry.unwrap().file_name().to_string_lossy().into_owned());
            }
        }
    }
    names.sort();
    names
}

/// Local filesystem whose renames always fail.
pub struct FailingRename {
    inner: LocalFs,
    attempts: Rc<Cell<usize>>,
}

impl FailingRename {
    /// The double plus a counter of attempted renames.
    pub fn new() -> (Self, Rc<Cell<usize>>) {
        let attempts = Rc::new(Cell::new(0));
        (
            FailingRename {
                inner: LocalFs::new(),
                attempts: attempts.clone(),
            },
            attempts,
        )
    }
}

impl Filesystem for FailingRename {
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        self.inner.open(path)
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        self.inner.create(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        self.inner.glob(pattern)
    }

    fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
        self.attempts.set(self.attempts.get() + 1);
        Err(io::Error::new(io::ErrorKind::Other, "rename interrupted"))
    }

    fn set_times(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()> {
        self.inner.set_times(path, atime, mtime)
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Filesystem that only fails on close and records that close was called.
pub struct FailingClose {
    pub message: &'static str,
    pub closed: Rc<Cell<bool>>,
}

impl FailingClose {
    pub fn new(message: &'static str) -> (Self, Rc<Cell<bool>>) {
        let closed = Rc::new(Cell::new(false));
        (
            FailingClose {
                message,
                closed: closed.clone(),
            },
            closed,
        )
    }
}

impl Filesystem for FailingClose {
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        LocalFs.open(path)
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        LocalFs.create(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        LocalFs.create_dir_all(path)
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        LocalFs.glob(pattern)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        LocalFs.rename(from, to)
    }

    fn set_times(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()> {
        LocalFs.set_times(path, atime, mtime)
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.set(true);
        Err(io::Error::new(io::ErrorKind::Other, self.message))
    }
}
