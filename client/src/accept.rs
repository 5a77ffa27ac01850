use crate::splice;
use anyhow::{Context, Result};
use codec::io::write_with_token;
use codec::{Command, Token, VERSION_1};
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Per-direction buffer for the accept-worker's splice, smaller than
/// the broker's own since this leg only ever carries one tunnel.
const ACCEPT_SPLICE_BUF: usize = 2 * 1024;

/// Opens a second connection to the broker carrying an ACCEPT for
/// `token`, dials `target`, and splices the two until either closes.
/// Failure at any step tears down just this worker -- the forward
/// session it was spawned from is unaffected.
pub async fn run(server: SocketAddr, target: SocketAddr, token: Token) -> Result<()> {
    let mut broker = TcpStream::connect(server).await.context("dial broker for accept")?;
    write_with_token(&mut broker, codec::Header::new(VERSION_1, Command::Accept), token).await?;

    let local = TcpStream::connect(target).await.context("dial local target")?;

    splice::splice(broker, local, ACCEPT_SPLICE_BUF).await;
    Ok(())
}
