pub mod config;
pub mod error;
pub mod pool;
pub mod proxy;
pub mod router;

// Stable public API re-exports
pub use config::Config;
pub use error::{BalancerError, ConfigError, ForwardError};
pub use pool::BackendPool;
pub use proxy::BalancerProxy;
pub use proxy::forward::Target;
pub use router::{Dispatch, Router};
