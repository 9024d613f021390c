use log::{info, warn};

use crate::config::Config;
use crate::error::ConfigError;
use crate::pool::BackendPool;

/// Liveness path answered by the proxy itself
pub const PING_PATH: &str = "/ping";

/// An endpoint prefix bound to the pool that owns its destinations.
#[derive(Debug)]
pub struct Route {
    pool: BackendPool,
}

impl Route {
    pub fn endpoint(&self) -> &str {
        self.pool.endpoint()
    }

    /// Prefix matching on path segment boundaries:
    /// `/api` matches `/api`, `/api/` and `/api/users` but not `/apikeys`.
    pub fn matches(&self, path: &str) -> bool {
        prefix_matches(self.endpoint(), path)
    }
}

/// Result of routing one request: the matched endpoint and the destination
/// the pool picked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch<'a> {
    pub endpoint: &'a str,
    pub destination: &'a str,
}

/// Immutable route table. Overlapping prefixes resolve to the longest one.
#[derive(Debug, Default)]
pub struct Router {
    // kept sorted by descending endpoint length
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Builds the route table from configuration.
    ///
    /// Invalid resources are logged and skipped; the returned errors list
    /// every skipped resource.
    pub fn from_config(config: &Config) -> (Self, Vec<ConfigError>) {
        let mut router = Self::new();
        let mut skipped = Vec::new();

        for resource in &config.resources {
            let registered = resource.validate().and_then(|(endpoint, destinations)| {
                let pool = BackendPool::new(endpoint, destinations)?;
                let summary = format!("{} -> {:?}", pool.endpoint(), pool.destinations());
                router.register(pool).map(|()| summary)
            });

            match registered {
                Ok(summary) => info!("Registered resource '{}' at {}", resource.name, summary),
                Err(e) => {
                    warn!("Skipping resource '{}': {}", resource.name, e);
                    skipped.push(e);
                }
            }
        }

        (router, skipped)
    }

    pub fn register(&mut self, pool: BackendPool) -> Result<(), ConfigError> {
        let endpoint = pool.endpoint();

        if endpoint == PING_PATH {
            return Err(ConfigError::ReservedEndpoint {
                endpoint: endpoint.to_string(),
            });
        }

        if self.routes.iter().any(|r| r.endpoint() == endpoint) {
            return Err(ConfigError::DuplicateEndpoint {
                endpoint: endpoint.to_string(),
            });
        }

        let at = self
            .routes
            .iter()
            .position(|r| r.endpoint().len() < endpoint.len())
            .unwrap_or(self.routes.len());
        self.routes.insert(at, Route { pool });
        Ok(())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn find(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(path))
    }

    /// Matches `path` and advances the matched pool's cursor exactly once.
    pub fn dispatch(&self, path: &str) -> Option<Dispatch<'_>> {
        let route = self.find(path)?;
        Some(Dispatch {
            endpoint: route.endpoint(),
            destination: route.pool.select_next(),
        })
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if path == prefix {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => prefix.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}
