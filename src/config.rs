use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 53;

// a.root-servers.net
const DEFAULT_ROOT_SERVER: IpAddr = IpAddr::V4(Ipv4Addr::new(198, 41, 0, 4));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// Everything the resolver needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Where every top-level lookup starts
    pub root_server: IpAddr,

    pub port: u16,

    /// Per-attempt wait for a response
    pub timeout_secs: u64,

    /// Resends of the same query after the first attempt times out
    pub max_retries: u32,

    /// CNAME chases plus glueless nameserver lookups per lookup
    pub max_indirection: usize,

    /// Referrals followed per lookup
    pub max_referrals: usize,

    /// Compare cache keys case-insensitively, ignoring a trailing dot
    pub normalize_names: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root_server: DEFAULT_ROOT_SERVER,
            port: DEFAULT_PORT,
            timeout_secs: 5,
            max_retries: 2,
            max_indirection: 10,
            max_referrals: 32,
            normalize_names: true,
        }
    }
}

impl ResolverConfig {
    pub fn with_root_server(root_server: IpAddr) -> Self {
        Self {
            root_server,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load configuration from a TOML file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.display().to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
