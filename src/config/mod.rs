// Configuration module
//
// The configuration lives in a flat properties file. Missing keys fall back
// to defaults, and the effective configuration is written back on startup so
// operators can see every knob in one place.

pub mod properties;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub use properties::{Properties, PropertiesError};

use crate::constants::{
    DEFAULT_ADDRESS, DEFAULT_CACHE_DIRECTORY, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_PORT,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SERVERS,
    DEFAULT_TRANSFER_TIMEOUT_MS,
};

const SERVERS: &str = "servers";
const CACHE_DIRECTORY: &str = "cache-directory";
const ADDRESS: &str = "address";
const PORT: &str = "port";
const CONNECT_TIMEOUT_MS: &str = "connect-timeout-ms";
const REQUEST_TIMEOUT_MS: &str = "request-timeout-ms";
const READ_TIMEOUT_MS: &str = "read-timeout-ms";
const TRANSFER_TIMEOUT_MS: &str = "transfer-timeout-ms";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No servers provided!")]
    NoServers,

    #[error("Invalid server '{server}': {reason}")]
    InvalidServer { server: String, reason: String },

    #[error("Invalid value for '{key}': '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("Failed to read properties: {0}")]
    Properties(#[from] PropertiesError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Listen address for the HTTP front end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl ServerConfig {
    /// `address:port`, as handed to the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Per-attempt limits applied to every upstream request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamTimeouts {
    /// Time allowed to establish a connection
    pub connect: Duration,
    /// Time allowed until response headers arrive
    pub request: Duration,
    /// Time allowed between two body chunks
    pub read: Duration,
    /// Time allowed for the whole attempt, from sending the request to the
    /// last body byte
    pub transfer: Duration,
}

impl Default for UpstreamTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            request: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            read: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            transfer: Duration::from_millis(DEFAULT_TRANSFER_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Upstream base URLs, consulted in order. Never empty.
    pub servers: Vec<String>,
    pub cache_directory: PathBuf,
    pub server: ServerConfig,
    pub timeouts: UpstreamTimeouts,
}

impl Config {
    /// Build a validated configuration with default listener and timeouts
    pub fn new(servers: Vec<String>, cache_directory: PathBuf) -> Result<Self, ConfigError> {
        let config = Self {
            servers: servers
                .into_iter()
                .map(|s| s.trim_end_matches('/').to_string())
                .collect(),
            cache_directory,
            server: ServerConfig::default(),
            timeouts: UpstreamTimeouts::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        for server in &self.servers {
            let url = reqwest::Url::parse(server).map_err(|e| ConfigError::InvalidServer {
                server: server.clone(),
                reason: e.to_string(),
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidServer {
                    server: server.clone(),
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
        }
        Ok(())
    }

    /// Properties a fresh installation starts from
    pub fn default_properties() -> Properties {
        let cache_directory = absolutize(Path::new(DEFAULT_CACHE_DIRECTORY));
        let defaults = UpstreamTimeouts::default();
        [
            (SERVERS, DEFAULT_SERVERS.join(", ")),
            (CACHE_DIRECTORY, cache_directory.display().to_string()),
            (ADDRESS, DEFAULT_ADDRESS.to_string()),
            (PORT, DEFAULT_PORT.to_string()),
            (CONNECT_TIMEOUT_MS, millis(defaults.connect)),
            (REQUEST_TIMEOUT_MS, millis(defaults.request)),
            (READ_TIMEOUT_MS, millis(defaults.read)),
            (TRANSFER_TIMEOUT_MS, millis(defaults.transfer)),
        ]
        .into_iter()
        .collect()
    }

    /// Interpret already-merged properties. Does not touch the filesystem.
    pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        let servers = require(props, SERVERS)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let cache_directory = absolutize(Path::new(require(props, CACHE_DIRECTORY)?));

        let mut config = Self::new(servers, cache_directory)?;
        if let Some(address) = props.get(ADDRESS) {
            config.server.address = address.to_string();
        }
        if let Some(port) = props.get(PORT) {
            config.server.port = parse_value(PORT, port)?;
        }
        if let Some(value) = props.get(CONNECT_TIMEOUT_MS) {
            config.timeouts.connect = Duration::from_millis(parse_value(CONNECT_TIMEOUT_MS, value)?);
        }
        if let Some(value) = props.get(REQUEST_TIMEOUT_MS) {
            config.timeouts.request = Duration::from_millis(parse_value(REQUEST_TIMEOUT_MS, value)?);
        }
        if let Some(value) = props.get(READ_TIMEOUT_MS) {
            config.timeouts.read = Duration::from_millis(parse_value(READ_TIMEOUT_MS, value)?);
        }
        if let Some(value) = props.get(TRANSFER_TIMEOUT_MS) {
            config.timeouts.transfer =
                Duration::from_millis(parse_value(TRANSFER_TIMEOUT_MS, value)?);
        }
        Ok(config)
    }

    /// Load the configuration stored at `location`, falling back to defaults
    /// for every missing key (or for everything when the file is absent).
    /// The cache directory is created and canonicalized.
    pub fn load_from(location: &Path) -> Result<Self, ConfigError> {
        let props = Properties::load_from(location, &Self::default_properties())?;
        let mut config = Self::from_properties(&props)?;
        std::fs::create_dir_all(&config.cache_directory)?;
        config.cache_directory = config.cache_directory.canonicalize()?;
        Ok(config)
    }

    pub fn to_properties(&self) -> Properties {
        [
            (SERVERS, self.servers.join(", ")),
            (CACHE_DIRECTORY, self.cache_directory.display().to_string()),
            (ADDRESS, self.server.address.clone()),
            (PORT, self.server.port.to_string()),
            (CONNECT_TIMEOUT_MS, millis(self.timeouts.connect)),
            (REQUEST_TIMEOUT_MS, millis(self.timeouts.request)),
            (READ_TIMEOUT_MS, millis(self.timeouts.read)),
            (TRANSFER_TIMEOUT_MS, millis(self.timeouts.transfer)),
        ]
        .into_iter()
        .collect()
    }

    pub fn save_to(&self, location: &Path) -> Result<(), ConfigError> {
        self.to_properties().save_to(location)?;
        Ok(())
    }

    /// Log the effective configuration at startup
    pub fn log_summary(&self) {
        tracing::info!(count = self.servers.len(), "Using upstream servers");
        for (position, server) in self.servers.iter().enumerate() {
            tracing::info!(position, server = %server, "Upstream server");
        }
        tracing::info!(
            cache_directory = %self.cache_directory.display(),
            listen = %self.server.listen_addr(),
            connect_timeout_ms = self.timeouts.connect.as_millis() as u64,
            request_timeout_ms = self.timeouts.request.as_millis() as u64,
            read_timeout_ms = self.timeouts.read.as_millis() as u64,
            transfer_timeout_ms = self.timeouts.transfer.as_millis() as u64,
            "Using cache directory"
        );
    }
}

fn require<'a>(props: &'a Properties, key: &'static str) -> Result<&'a str, ConfigError> {
    props.get(key).ok_or(ConfigError::MissingKey(key))
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn millis(duration: Duration) -> String {
    duration.as_millis().to_string()
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
