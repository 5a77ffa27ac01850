use codec::io::{read_header, read_token, write_with_token};
use codec::{Command, Header, Token, VERSION_1, VERSION_2};
use fsh_server::server::monitor::Monitor;
use fsh_server::server::run_on;
use service::Registry;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn spawn_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let registry = Registry::new();
    let monitor = Monitor::new();
    service::spawn_watchdog(registry.clone());
    tokio::spawn(run_on(listener, registry, monitor));

    addr
}

async fn login(stream: &mut TcpStream, token: Token) -> Token {
    write_with_token(stream, Header::new(VERSION_2, Command::Login), token).await.unwrap();
    let header = read_header(stream).await.unwrap();
    assert_eq!(header.cmd, Command::Token);
    read_token(stream).await.unwrap()
}

#[tokio::test]
async fn server_assigns_token_on_zero_login() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let assigned = login(&mut stream, Token::ZERO).await;
    assert!(!assigned.is_zero());
}

#[tokio::test]
async fn client_chosen_token_is_honored() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let chosen = Token::generate();
    let assigned = login(&mut stream, chosen).await;
    assert_eq!(assigned, chosen);
}

#[tokio::test]
async fn duplicate_login_evicts_prior_forward_session() {
    let addr = spawn_server().await;
    let token = Token::generate();

    let mut first = TcpStream::connect(addr).await.unwrap();
    login(&mut first, token).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    let assigned = login(&mut second, token).await;
    assert_eq!(assigned, token);

    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(Duration::from_secs(3), first.read(&mut buf))
        .await
        .expect("evicted session should close promptly")
        .unwrap();
    assert_eq!(n, 0, "evicted forward connection should observe EOF");
}

#[tokio::test]
async fn unknown_token_connect_closes_without_relaying() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    write_with_token(&mut stream, Header::new(VERSION_1, Command::Connect), Token::generate())
        .await
        .unwrap();

    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(Duration::from_secs(3), stream.read(&mut buf))
        .await
        .expect("server should close after its unmatched-token delay")
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn full_pairing_relays_bytes_both_ways() {
    let addr = spawn_server().await;

    let mut forward = TcpStream::connect(addr).await.unwrap();
    let token = login(&mut forward, Token::ZERO).await;

    let mut connect = TcpStream::connect(addr).await.unwrap();
    write_with_token(&mut connect, Header::new(VERSION_1, Command::Connect), token).await.unwrap();

    let header = read_header(&mut forward).await.unwrap();
    assert_eq!(header.cmd, Command::Connect);
    let notified = read_token(&mut forward).await.unwrap();
    assert_eq!(notified, token);

    let mut accept = TcpStream::connect(addr).await.unwrap();
    write_with_token(&mut accept, Header::new(VERSION_1, Command::Accept), token).await.unwrap();

    connect.write_all(b"PING").await.unwrap();
    let mut buf = [0u8; 4];
    accept.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"PING");

    accept.write_all(b"PONG").await.unwrap();
    connect.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"PONG");
}

#[tokio::test]
async fn version_one_peer_never_receives_keep_alive() {
    let addr = spawn_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // a v1 login carries no token payload
    stream.write_all(&Header::new(VERSION_1, Command::Login).encode()).await.unwrap();
    let header = read_header(&mut stream).await.unwrap();
    assert_eq!(header.cmd, Command::Token);
    let _token = read_token(&mut stream).await.unwrap();

    // the server must not spontaneously send keep-alives; confirm no
    // bytes arrive within a window well under the heartbeat interval
    let mut buf = [0u8; 1];
    let result = tokio::time::timeout(Duration::from_millis(300), stream.read(&mut buf)).await;
    assert!(result.is_err(), "server sent unsolicited bytes to a quiet v1 session");
}
