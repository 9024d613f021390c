use std::path::PathBuf;

use pingora::prelude::{Error, ErrorType};
use thiserror::Error;

/// Problems found while turning configuration into routes.
///
/// A resource that fails with one of these is skipped; the rest of the
/// configuration still loads.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("resource '{name}' has an invalid endpoint '{endpoint}'")]
    InvalidEndpoint { name: String, endpoint: String },

    #[error("resource '{name}' has no destinations")]
    NoDestinations { name: String },

    #[error("resource '{name}' has an unusable destination '{url}': {source}")]
    InvalidDestination {
        name: String,
        url: String,
        source: ForwardError,
    },

    #[error("backend pool for '{endpoint}' cannot be empty")]
    EmptyPool { endpoint: String },

    #[error("endpoint '{endpoint}' is already registered")]
    DuplicateEndpoint { endpoint: String },

    #[error("endpoint '{endpoint}' is reserved")]
    ReservedEndpoint { endpoint: String },
}

/// Request-time failures to turn a destination into an upstream target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    #[error("bad backend url '{url}': {source}")]
    BadUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("backend url '{url}' has no host")]
    MissingHost { url: String },
}

impl From<ForwardError> for Box<Error> {
    fn from(e: ForwardError) -> Self {
        Error::explain(ErrorType::InternalError, e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum BalancerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("server error: {0}")]
    Server(#[from] Box<Error>),
}
