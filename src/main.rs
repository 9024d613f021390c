use log::{error, info, warn};
use pingora::prelude::*;
use rr_proxy::config::{self, Config};
use rr_proxy::{BalancerError, BalancerProxy, Router};

fn run() -> Result<(), BalancerError> {
    let path = config::config_path();
    let config = Config::load(&path)?;
    info!("Loaded configuration from {}", path);

    let (router, skipped) = Router::from_config(&config);
    if !skipped.is_empty() {
        warn!("{} resource(s) skipped due to configuration errors", skipped.len());
    }

    let mut server = Server::new(None)?;
    server.bootstrap();

    let mut proxy = http_proxy_service(&server.configuration, BalancerProxy::new(router));

    let listen_addr = config.server.listen_addr();
    proxy.add_tcp(&listen_addr);
    server.add_service(proxy);

    info!("Starting load balancer on {}", listen_addr);
    server.run_forever()
}

fn main() {
    // Set up logging
    env_logger::init();

    if let Err(e) = run() {
        error!("Failed to start load balancer: {}", e);
        std::process::exit(1);
    }
}
