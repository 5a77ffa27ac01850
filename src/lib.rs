pub mod config;
pub mod server;

use anyhow::Result;
use config::Config;
use std::sync::Arc;

pub async fn server_main(config: Arc<Config>) -> Result<()> {
    let registry = service::Registry::new();
    let monitor = server::monitor::Monitor::new();

    service::spawn_watchdog(registry.clone());
    monitor.spawn_reporter(registry.clone());

    server::run(config, registry, monitor).await
}
