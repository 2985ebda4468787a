//! SFTP backend built on libssh2.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ssh2::{
    CheckResult, ErrorCode, FileStat, KnownHostFileKind, RenameFlags, Session, Sftp,
};
use tracing::{debug, warn};

use crate::error::TransferError;
use crate::fs::{FileHandle, Filesystem};
use crate::utils::glob_with;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DIR_MODE: i32 = 0o755;
/// `SSH_FX_NO_SUCH_FILE`
const FX_NO_SUCH_FILE: i32 = 2;

/// How the user authenticates to the SSH server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    /// Path to a private key file. Takes precedence over a password.
    PrivateKey(PathBuf),
}

/// What to do with the server's host key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyCheck {
    /// Accept any host key. Leaves the session open to impersonation.
    #[default]
    Ignore,
    /// Require a matching entry in an OpenSSH `known_hosts` file.
    KnownHosts(PathBuf),
}

/// Everything needed to open an SFTP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: Credential,
    pub host_key: HostKeyCheck,
}

impl SftpConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A remote filesystem reached over one authenticated SFTP session.
pub struct SftpFs {
    session: Session,
    sftp: Sftp,
    address: String,
}

impl SftpFs {
    /// Connects, authenticates and opens the SFTP subsystem.
    pub fn connect(config: &SftpConfig) -> Result<Self, TransferError> {
        let address = config.address();
        let fail = |message: String| TransferError::Connection {
            address: address.clone(),
            message,
        };

        let socket = address
            .to_socket_addrs()
            .map_err(|e| fail(format!("could not resolve address: {}", e)))?
            .next()
            .ok_or_else(|| fail("address resolved to nothing".to_string()))?;
        let tcp = TcpStream::connect_timeout(&socket, CONNECT_TIMEOUT)
            .map_err(|e| fail(e.to_string()))?;

        let mut session = Session::new().map_err(|e| fail(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| fail(format!("SSH handshake failed: {}", e)))?;

        verify_host_key(&session, config).map_err(fail)?;

        match &config.credential {
            Credential::PrivateKey(key) => {
                if !key.is_file() {
                    return Err(fail(format!(
                        "unable to read private key {}",
                        key.display()
                    )));
                }
                session
                    .userauth_pubkey_file(&config.user, None, key, None)
                    .map_err(|e| fail(format!("key authentication failed: {}", e)))?;
            }
            Credential::Password(password) => {
                session
                    .userauth_password(&config.user, password)
                    .map_err(|e| fail(format!("password authentication failed: {}", e)))?;
            }
        }
        if !session.authenticated() {
            return Err(fail(format!("could not authenticate as {}", config.user)));
        }

        let sftp = session
            .sftp()
            .map_err(|e| fail(format!("could not start SFTP subsystem: {}", e)))?;
        debug!("opened SFTP session to {} as {}", address, config.user);

        Ok(SftpFs {
            session,
            sftp,
            address,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn read_dir(&self, dir: &Path) -> io::Result<Vec<(String, bool)>> {
        match self.sftp.readdir(dir) {
            Ok(entries) => Ok(entries
                .into_iter()
                .filter_map(|(path, stat)| {
                    let name = path.file_name()?.to_string_lossy().into_owned();
                    Some((name, stat.is_dir()))
                })
                .collect()),
            Err(e) if is_missing(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn verify_host_key(session: &Session, config: &SftpConfig) -> Result<(), String> {
    let known_hosts = match &config.host_key {
        HostKeyCheck::Ignore => {
            warn!(
                "host key for {} is not verified; configure a known_hosts file to check it",
                config.address()
            );
            return Ok(());
        }
        HostKeyCheck::KnownHosts(path) => path,
    };

    let mut hosts = session.known_hosts().map_err(|e| e.to_string())?;
    hosts
        .read_file(known_hosts, KnownHostFileKind::OpenSSH)
        .map_err(|e| format!("could not read {}: {}", known_hosts.display(), e))?;
    let (key, _) = session
        .host_key()
        .ok_or_else(|| "server sent no host key".to_string())?;
    match hosts.check_port(&config.host, config.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(format!(
            "host {} not found in {}",
            config.host,
            known_hosts.display()
        )),
        CheckResult::Mismatch => Err(format!("host key mismatch for {}", config.host)),
        CheckResult::Failure => Err("host key check failed".to_string()),
    }
}

fn is_missing(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::SFTP(FX_NO_SUCH_FILE))
}

/// An open remote file.
struct RemoteFile(ssh2::File);

impl Read for RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for RemoteFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl FileHandle for RemoteFile {
    fn modified(&mut self) -> io::Result<SystemTime> {
        let stat = self.0.stat()?;
        let mtime = stat.mtime.ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "server did not report a modification time")
        })?;
        Ok(UNIX_EPOCH + Duration::from_secs(mtime))
    }

    fn finish(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.0.close()?;
        Ok(())
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Filesystem for SftpFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        Ok(Box::new(RemoteFile(self.sftp.open(path)?)))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn FileHandle>> {
        Ok(Box::new(RemoteFile(self.sftp.create(path)?)))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component.as_os_str());
            if current.parent().is_none() {
                continue;
            }
            match self.sftp.stat(&current) {
                Ok(stat) if stat.is_dir() => continue,
                Ok(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists and is not a directory", current.display()),
                    ))
                }
                Err(e) if is_missing(&e) => {}
                Err(e) => return Err(e.into()),
            }
            if let Err(e) = self.sftp.mkdir(&current, DIR_MODE) {
                // Lost a race with another writer; fine as long as it is a dir now.
                match self.sftp.stat(&current) {
                    Ok(stat) if stat.is_dir() => {}
                    _ => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        glob_with(pattern, |dir| self.read_dir(dir))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let flags = RenameFlags::ATOMIC | RenameFlags::OVERWRITE | RenameFlags::NATIVE;
        match self.sftp.rename(from, to, Some(flags)) {
            Ok(()) => Ok(()),
            Err(first) => {
                // SFTP v3 servers ignore the flags and refuse to replace an
                // existing target.
                match self.sftp.stat(to) {
                    Ok(_) => {
                        self.sftp.unlink(to)?;
                        self.sftp.rename(from, to, Some(flags))?;
                        Ok(())
                    }
                    Err(_) => Err(first.into()),
                }
            }
        }
    }

    fn set_times(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> io::Result<()> {
        let stat = FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: None,
            atime: Some(unix_secs(atime)),
            mtime: Some(unix_secs(mtime)),
        };
        self.sftp.setstat(path, stat)?;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.session
            .disconnect(None, "seaflow-transfer done", None)
            .map_err(io::Error::from)
    }
}
