pub mod monitor;
pub mod session;
pub mod splice;

use crate::config::Config;
use anyhow::Result;
use service::Registry;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Accepts connections on `config.listen` forever, spawning one task
/// per connection. A session's own errors never bring the server down
/// -- only the outer bind/accept loop can.
pub async fn run(config: Arc<Config>, registry: Arc<Registry>, monitor: Arc<monitor::Monitor>) -> Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    log::info!("fsh-server listening on {}", config.listen);

    run_on(listener, registry, monitor).await
}

/// Like [`run`] but accepts an already-bound listener, letting callers
/// (tests, mainly) bind to an ephemeral port and learn the chosen
/// address before the accept loop starts.
pub async fn run_on(listener: TcpListener, registry: Arc<Registry>, monitor: Arc<monitor::Monitor>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let registry = registry.clone();
        let monitor = monitor.clone();

        tokio::spawn(async move {
            if let Err(err) = session::serve(stream, peer, registry, monitor).await {
                log::debug!("session with {peer} ended: {err:#}");
            }
        });
    }
}
