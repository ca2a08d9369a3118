use std::io;
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end the daemon.
///
/// Anything recoverable (LED writes, per-side rumble failures) is logged where it
/// happens and never turned into one of these.
#[derive(Debug, Error)]
pub enum Error {
    #[error("epoll {op} failed for fd {fd}: {source}")]
    Multiplexer {
        op: &'static str,
        fd: RawFd,
        source: io::Error,
    },

    #[error("fd {0} is already registered with the multiplexer")]
    DuplicateFd(RawFd),

    #[error("subscriber {0} is not registered with the multiplexer")]
    UnknownSubscriber(u64),

    #[error("waiting for readiness failed: {0}")]
    Wait(io::Error),

    #[error("I/O error on {path}: {source}")]
    Device { path: String, source: io::Error },

    #[error("failed to create virtual device: {0}")]
    VirtualDevice(io::Error),

    #[error("device discovery failed: {0}")]
    Discovery(io::Error),

    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("controller ownership violated: {0}")]
    Ownership(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
