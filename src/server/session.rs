use crate::server::monitor::{Event, Monitor};
use crate::server::splice;
use anyhow::{Result, bail};
use codec::io::{encode_with_token, read_header, read_token};
use codec::{Command, Header, Token, VERSION_1, Version};
use service::{Registry, Role, Session};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Per-direction buffer size used once a forward/connect pair has been
/// spliced together.
const SERVER_SPLICE_BUF: usize = 8 * 1024;

/// How long an unmatched CONNECT or ACCEPT sleeps before closing, a
/// soft deterrent against token enumeration.
const UNKNOWN_TOKEN_DELAY: Duration = Duration::from_millis(1500);

/// Drives one accepted connection through login/connect/accept
/// classification and, once paired, splices it with its peer.
///
/// Returns once the session is fully closed; errors are the reason it
/// closed, not necessarily a bug -- an unmatched token or a peer that
/// hung up mid-handshake both surface as `Err` here and are logged by
/// the caller at a low level.
pub async fn serve(
    mut stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<Registry>,
    monitor: Arc<Monitor>,
) -> Result<()> {
    let header = read_header(&mut stream).await?;

    match header.cmd {
        Command::Login => serve_forward(stream, header, peer, registry, monitor).await,
        Command::Connect => serve_connect(stream, peer, registry, monitor, header.version).await,
        Command::Accept => serve_accept(stream, peer, registry).await,
        other => bail!("unexpected command {other:?} as first frame from {peer}"),
    }
}

async fn serve_forward(
    stream: TcpStream,
    header: Header,
    peer: SocketAddr,
    registry: Arc<Registry>,
    monitor: Arc<Monitor>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    let requested = if header.version >= 2 {
        let token = read_token(&mut reader).await?;
        if token.is_zero() { None } else { Some(token) }
    } else {
        None
    };

    let (token, origin) = match requested {
        Some(token) => (token, "client"),
        None => (Token::generate(), "server"),
    };

    let (session, evicted) = registry.login(token);
    if let Some(evicted) = evicted {
        evicted.kill();
    }

    log::info!("L {token} {peer}");
    log::debug!("forward session token {token} assigned from {origin}");
    monitor.record(Event::Login);

    let reply = encode_with_token(Header::new(VERSION_1, Command::Token), token);
    if writer.write_all(&reply).await.is_err() {
        registry.remove(session.id);
        log::info!("D {token} {peer}");
        monitor.record(Event::Disconnect);
        bail!("failed to write TOKEN reply to {peer}");
    }
    session.touch();

    let (tx, mut rx) = mpsc::unbounded_channel();
    session.set_outbox(tx);

    let result = forward_loop(&mut reader, &mut writer, &session, &mut rx).await;

    registry.remove(session.id);
    log::info!("D {token} {peer}");
    monitor.record(Event::Disconnect);

    result
}

async fn forward_loop<R, W>(
    reader: &mut R,
    writer: &mut W,
    session: &Arc<Session>,
    rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;

            _ = session.cancelled() => return Ok(()),

            frame = rx.recv() => match frame {
                Some(bytes) => {
                    writer.write_all(&bytes).await?;
                    session.touch();
                }
                None => return Ok(()),
            },

            header = read_header(reader) => {
                let header = header?;
                session.touch();

                match header.cmd {
                    Command::KeepAlive => {
                        if header.version != VERSION_1 {
                            let reply = Header::new(VERSION_1, Command::KeepAlive).encode();
                            writer.write_all(&reply).await?;
                        }
                    }
                    other => bail!("unexpected command {other:?} on forward control connection"),
                }
            }
        }
    }
}

async fn serve_connect(
    mut stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<Registry>,
    monitor: Arc<Monitor>,
    version: Version,
) -> Result<()> {
    let token = read_token(&mut stream).await?;
    log::info!("C {token} {peer}");
    monitor.record(Event::Connect);

    let forward = match registry.find(Role::Forward, token) {
        Some(forward) => forward,
        None => {
            tokio::time::sleep(UNKNOWN_TOKEN_DELAY).await;
            bail!("no forward session registered for token {token}");
        }
    };

    // a role is now on record for this token, so every exit from here
    // on must close out with D, matching the forward side below.
    let connect_session = registry.insert(Role::Connect, token);
    let result = serve_connect_paired(stream, token, version, &monitor, &forward, &connect_session).await;

    registry.remove(connect_session.id);
    log::info!("D {token} {peer}");
    monitor.record(Event::Disconnect);

    result
}

async fn serve_connect_paired(
    stream: TcpStream,
    token: Token,
    version: Version,
    monitor: &Arc<Monitor>,
    forward: &Arc<Session>,
    connect_session: &Arc<Session>,
) -> Result<()> {
    let handoff = connect_session.prepare_handoff();

    let notify = encode_with_token(Header::new(version, Command::Connect), token);
    forward.send_frame(notify)?;

    let remote = tokio::select! {
        _ = connect_session.cancelled() => {
            bail!("connect session for token {token} timed out waiting for an accept");
        }
        stream = handoff => stream.map_err(|_| service::Error::HandoffDropped)?,
    };

    let (sent, received) = splice::splice(stream, remote, SERVER_SPLICE_BUF).await;
    monitor.record(Event::BytesRelayed(sent + received));

    Ok(())
}

async fn serve_accept(mut stream: TcpStream, peer: SocketAddr, registry: Arc<Registry>) -> Result<()> {
    let token = read_token(&mut stream).await?;

    let waiting = match registry.find(Role::Connect, token) {
        Some(session) => session,
        None => {
            tokio::time::sleep(UNKNOWN_TOKEN_DELAY).await;
            bail!("no connect session waiting for accept token {token} from {peer}");
        }
    };

    if let Err(stream) = waiting.accept_handoff(stream) {
        drop(stream);
        bail!("connect session for token {token} already gave up before accept arrived from {peer}");
    }

    Ok(())
}
