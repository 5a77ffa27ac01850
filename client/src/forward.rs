use anyhow::{Context, Result, bail};
use codec::io::{read_header, read_token, write_with_token};
use codec::{Command, Header, Token, VERSION_2};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Heartbeat period; also the bound on how long a dead control
/// connection takes to be noticed (at most two periods: one to send
/// the probe, one to time out waiting for its reply).
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Registers with the broker under `requested_token` (or lets it
/// assign one) and serves CONNECT notifications by spawning an
/// accept-worker against `target` for each one. Runs until the
/// control connection is judged dead, at which point it returns an
/// error -- restarting the forward-client on failure is left to the
/// caller's process supervisor, matching the upstream client's own
/// fail-fast design.
pub async fn run(server: SocketAddr, target: SocketAddr, requested_token: Option<Token>) -> Result<()> {
    let mut stream = TcpStream::connect(server).await.context("dial broker")?;

    let login_token = requested_token.unwrap_or(Token::ZERO);
    write_with_token(&mut stream, Header::new(VERSION_2, Command::Login), login_token).await?;

    let header = read_header(&mut stream).await?;
    if header.cmd != Command::Token {
        bail!("expected TOKEN reply from broker, got {:?}", header.cmd);
    }

    let token = read_token(&mut stream).await?;
    let origin = if requested_token == Some(token) { "client" } else { "server" };
    log::info!("Token: {token} (from {origin})");

    heartbeat_loop(stream, server, token, target).await
}

async fn heartbeat_loop(mut stream: TcpStream, server: SocketAddr, token: Token, target: SocketAddr) -> Result<()> {
    let mut waiting_keep_alive = false;
    let mut deadline = Instant::now() + KEEP_ALIVE_INTERVAL;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                if waiting_keep_alive {
                    log::warn!("Connection lost!");
                    bail!("heartbeat timed out waiting for a reply, token {token}");
                }

                let frame = Header::new(VERSION_2, Command::KeepAlive).encode();
                tokio::io::AsyncWriteExt::write_all(&mut stream, &frame).await?;
                waiting_keep_alive = true;
                deadline = Instant::now() + KEEP_ALIVE_INTERVAL;
            }

            header = read_header(&mut stream) => {
                let header = header?;

                match header.cmd {
                    Command::KeepAlive => {
                        waiting_keep_alive = false;
                        deadline = Instant::now() + KEEP_ALIVE_INTERVAL;
                    }
                    Command::Connect => {
                        let notified = read_token(&mut stream).await?;
                        if notified != token {
                            bail!("broker sent CONNECT for a foreign token, aborting");
                        }

                        deadline = Instant::now() + KEEP_ALIVE_INTERVAL;

                        tokio::spawn(async move {
                            if let Err(err) = crate::accept::run(server, target, token).await {
                                log::debug!("accept-worker for token {token} failed: {err:#}");
                            }
                        });
                    }
                    other => bail!("unexpected command {other:?} on forward control connection"),
                }
            }
        }
    }
}
