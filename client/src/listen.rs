use crate::connect;
use anyhow::{Context, Result};
use codec::Token;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Binds `bind` and spawns a connect-client against `server`/`token`
/// for every accepted connection, forever. A single failed accept
/// does not bring the listener down.
pub async fn run(server: SocketAddr, token: Token, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind).await.context("bind local listen address")?;
    log::info!("listening on {bind}, forwarding via token {token}");

    loop {
        let (local, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                log::debug!("accept on {bind} failed: {err}");
                continue;
            }
        };

        tokio::spawn(async move {
            if let Err(err) = connect::run_with_local(server, token, local).await {
                log::debug!("connect-client for {peer} failed: {err:#}");
            }
        });
    }
}
