use crate::splice;
use anyhow::{Context, Result};
use codec::io::write_with_token;
use codec::{Command, Header, Token, VERSION_1};
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Per-direction buffer for a connect-client's splice.
const CONNECT_SPLICE_BUF: usize = 2 * 1024;

/// Dials `target` itself, then behaves like [`run_with_local`]. Used
/// by the one-shot `port-forward` subcommand, which has no listener
/// of its own.
pub async fn run_once(server: SocketAddr, token: Token, target: SocketAddr) -> Result<()> {
    let local = TcpStream::connect(target).await.context("dial local target")?;
    run_with_local(server, token, local).await
}

/// Dials the broker, announces `token` with CONNECT, and splices the
/// broker connection against an already-accepted `local` socket. Used
/// per-connection by `port-listen`.
pub async fn run_with_local(server: SocketAddr, token: Token, local: TcpStream) -> Result<()> {
    let mut broker = TcpStream::connect(server).await.context("dial broker for connect")?;
    write_with_token(&mut broker, Header::new(VERSION_1, Command::Connect), token).await?;

    splice::splice(broker, local, CONNECT_SPLICE_BUF).await;
    Ok(())
}
