//! Connection settings and the TOML file that names them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::query::ParamStyle;

/// Settings for one logical connection. Missing keys take the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Scheme prefix including `://`.
    pub protocol: String,
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Path of the REST root, with surrounding slashes.
    pub base: String,
    /// Basic-auth user; credentials are left out of the endpoint unless
    /// both user and password are set.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// Logs every dispatched query at info level.
    pub debug: bool,
    /// Placeholder syntax understood by the server.
    pub param_style: ParamStyle,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            protocol: "http://".into(),
            host: "localhost".into(),
            port: 7474,
            base: "/db/data/".into(),
            username: "neo4j".into(),
            password: "neo4j".into(),
            debug: false,
            param_style: ParamStyle::Braces,
        }
    }
}

impl ConnectionConfig {
    /// `protocol[user:pass@]host:port base`.
    pub fn endpoint(&self) -> String {
        let credentials = if self.has_credentials() {
            format!("{}:{}@", self.username, self.password)
        } else {
            String::new()
        };
        format!(
            "{}{credentials}{}:{}{}",
            self.protocol, self.host, self.port, self.base
        )
    }

    fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Endpoint with the password masked, for logs.
    pub fn redacted_endpoint(&self) -> String {
        if !self.has_credentials() {
            return self.endpoint();
        }
        format!(
            "{}{}:***@{}:{}{}",
            self.protocol, self.username, self.host, self.port, self.base
        )
    }
}

/// Named connections read from a config file.
#[derive(Debug, Default, Clone)]
pub struct AdapterConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl AdapterConfig {
    /// Reads `explicit`, or the default path when `None`. A missing file
    /// yields an empty config.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        Ok(Self { path, data })
    }

    /// Parses an in-memory TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let data = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Ok(Self { path: None, data })
    }

    /// Path the config was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Settings for `identity`.
    pub fn connection(&self, identity: &str) -> Result<&ConnectionConfig, ConfigError> {
        self.data
            .connections
            .get(identity)
            .ok_or_else(|| ConfigError::ConnectionNotFound {
                identity: identity.to_string(),
            })
    }

    /// Every configured connection, ordered by identity.
    pub fn connections(&self) -> impl Iterator<Item = (&str, &ConnectionConfig)> {
        self.data
            .connections
            .iter()
            .map(|(name, config)| (name.as_str(), config))
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    connections: BTreeMap<String, ConnectionConfig>,
}

/// Config file failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Parser error.
        source: toml::de::Error,
    },
    /// No `[connections.<identity>]` table.
    #[error("connection '{identity}' not found in config")]
    ConnectionNotFound {
        /// Requested identity.
        identity: String,
    },
}

/// `<config dir>/cypherkit/config.toml`, when the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("cypherkit").join("config.toml"))
}
