use crate::error::{Error, Result};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "JOYCOND_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/joycond.toml";

/// Daemon settings. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// udev tag the rules put on supported event nodes.
    pub udev_tag: String,
    pub blink_interval_ms: u64,
    /// Readiness events handled per wait.
    pub max_events: usize,
    /// 0 low, 1 medium, 2 high.
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            udev_tag: "joycond".to_string(),
            blink_interval_ms: 500,
            max_events: 10,
            verbosity: 0,
        }
    }
}

impl Config {
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(path, &text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn load_or_default() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(&path)
    }
}
