use serde::{Deserialize, Deserializer};
use std::path::Path;

use crate::error::ConfigError;
use crate::proxy::forward::Target;

pub const CONFIG_PATH_ENV: &str = "RR_PROXY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "data/config.yaml";

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Accepts both `8080` and `"8080"`
    #[serde(default = "default_listen_port", deserialize_with = "port_from_any")]
    pub listen_port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            listen_port: default_listen_port(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.listen_port)
    }
}

/// One proxied endpoint and its backends
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Resource {
    pub name: String,
    pub endpoint: String,

    /// Single-destination form, used when `destination_urls` is empty
    #[serde(default)]
    pub destination_url: Option<String>,

    #[serde(default)]
    pub destination_urls: Vec<String>,
}

impl Resource {
    /// Normalized destination list: the list form wins, the legacy single
    /// field is the fallback, blank entries are dropped.
    pub fn destinations(&self) -> Vec<String> {
        let listed: Vec<String> = self
            .destination_urls
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();

        if !listed.is_empty() {
            return listed;
        }

        self.destination_url
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| vec![d.to_string()])
            .unwrap_or_default()
    }

    /// Returns the validated `(endpoint, destinations)` pair for this resource.
    pub fn validate(&self) -> Result<(String, Vec<String>), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() || !endpoint.starts_with('/') {
            return Err(ConfigError::InvalidEndpoint {
                name: self.name.clone(),
                endpoint: self.endpoint.clone(),
            });
        }

        let destinations = self.destinations();
        if destinations.is_empty() {
            return Err(ConfigError::NoDestinations {
                name: self.name.clone(),
            });
        }

        for destination in &destinations {
            Target::parse(destination).map_err(|source| ConfigError::InvalidDestination {
                name: self.name.clone(),
                url: destination.clone(),
                source,
            })?;
        }

        Ok((endpoint.to_string(), destinations))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Config {
    pub fn from_yaml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_yaml(path, &content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `SERVER_HOST` / `SERVER_LISTEN_PORT` style overrides.
    /// Unparseable ports are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST").filter(|h| !h.is_empty()) {
            self.server.host = host;
        }

        if let Some(port) = lookup("SERVER_LISTEN_PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.listen_port = port,
                Err(_) => log::warn!("Ignoring invalid SERVER_LISTEN_PORT '{}'", port),
            }
        }
    }
}

/// Location of the configuration file, from the environment or the default.
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

fn port_from_any<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
