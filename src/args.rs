use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::error::TransferError;
use crate::fs::{Filesystem, LocalFs};
use crate::sftp::{Credential, HostKeyCheck, SftpConfig, SftpFs};

const ABOUT: &str = "Transfer SeaFlow files between source and destination, which can be SFTP or local.";

const LONG_ABOUT: &str = "\
Transfer SeaFlow files between source and destination, which can be SFTP or local.
Will not transfer gzipped files again, but will gzip EVT files before writing to destination.
If using SFTP, the SSH password may be set in ENV as SSHPASSWORD.
Otherwise the password will be gathered from a prompt.
All other options can be set in ENV as well, named as the uppercased option without dashes.";

#[derive(Debug, Clone, Parser)]
#[command(name = "seaflow-transfer", version, about = ABOUT, long_about = LONG_ABOUT)]
pub struct Cli {
    /// Root path of source
    #[arg(long, env = "SRCROOT")]
    pub src_root: PathBuf,

    /// Root path of destination
    #[arg(long, env = "DSTROOT")]
    pub dst_root: PathBuf,

    /// Address of SFTP source
    #[arg(long, env = "SRCADDRESS")]
    pub src_address: Option<String>,

    /// Address of SFTP destination
    #[arg(long, env = "DSTADDRESS")]
    pub dst_address: Option<String>,

    /// SSH port
    #[arg(long, env = "SSHPORT", default_value_t = 22)]
    pub ssh_port: u16,

    /// SSH user name
    #[arg(long, env = "SSHUSER", default_value = "")]
    pub ssh_user: String,

    /// SSH password
    #[arg(long, env = "SSHPASSWORD", hide_env_values = true)]
    pub ssh_password: Option<String>,

    /// SSH private key file, overrides the password
    #[arg(long, env = "SSHPRIVATEKEY")]
    pub ssh_private_key: Option<PathBuf>,

    /// OpenSSH known_hosts file used to verify server host keys.
    /// Without it host keys are not checked.
    #[arg(long, env = "KNOWNHOSTS")]
    pub known_hosts: Option<PathBuf>,

    /// Earliest file timestamp to transfer as an RFC3339 string
    #[arg(long, env = "START", value_parser = parse_start)]
    pub start: Option<DateTime<Utc>>,

    /// Suppress informational logging
    #[arg(long, env = "QUIET")]
    pub quiet: bool,

    /// Enable debugging logs
    #[arg(long, env = "VERBOSE")]
    pub verbose: bool,
}

fn parse_start(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("could not parse RFC3339 timestamp: {}", e))
}

/// One side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Local { root: PathBuf },
    Sftp { root: PathBuf, config: SftpConfig },
}

impl Endpoint {
    pub fn root(&self) -> &Path {
        match self {
            Endpoint::Local { root } | Endpoint::Sftp { root, .. } => root,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Endpoint::Sftp { .. })
    }

    /// Opens the filesystem this endpoint describes.
    pub fn connect(&self) -> Result<Box<dyn Filesystem>, TransferError> {
        match self {
            Endpoint::Local { .. } => Ok(Box::new(LocalFs::new())),
            Endpoint::Sftp { config, .. } => {
                let fs = SftpFs::connect(config)?;
                tracing::info!("connected to {} as {}", fs.address(), config.user);
                Ok(Box::new(fs))
            }
        }
    }
}

impl Cli {
    /// True if either side is an SFTP server.
    pub fn needs_ssh(&self) -> bool {
        self.src_address.is_some() || self.dst_address.is_some()
    }

    /// True if SSH is needed but no password or key was given.
    pub fn needs_password_prompt(&self) -> bool {
        self.needs_ssh() && self.ssh_private_key.is_none() && self.ssh_password.is_none()
    }

    fn credential(&self) -> Credential {
        match (&self.ssh_private_key, &self.ssh_password) {
            (Some(key), _) => Credential::PrivateKey(key.clone()),
            (None, Some(password)) => Credential::Password(password.clone()),
            (None, None) => Credential::Password(String::new()),
        }
    }

    fn endpoint(&self, root: &Path, address: Option<&str>) -> Endpoint {
        match address {
            None => Endpoint::Local {
                root: root.to_path_buf(),
            },
            Some(host) => Endpoint::Sftp {
                root: root.to_path_buf(),
                config: SftpConfig {
                    host: host.to_string(),
                    port: self.ssh_port,
                    user: self.ssh_user.clone(),
                    credential: self.credential(),
                    host_key: self
                        .known_hosts
                        .clone()
                        .map_or(HostKeyCheck::Ignore, HostKeyCheck::KnownHosts),
                },
            },
        }
    }

    /// Source and destination endpoints.
    pub fn endpoints(&self) -> (Endpoint, Endpoint) {
        (
            self.endpoint(&self.src_root, self.src_address.as_deref()),
            self.endpoint(&self.dst_root, self.dst_address.as_deref()),
        )
    }

    /// Tracing filter directive implied by `--quiet` and `--verbose`.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
