use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

async fn pump(mut reader: OwnedReadHalf, mut writer: OwnedWriteHalf, buf_size: usize) {
    let mut buf = vec![0u8; buf_size];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };

        if writer.write_all(&buf[..n]).await.is_err() {
            break;
        }
    }

    let _ = writer.shutdown().await;
}

/// Bidirectionally copies bytes between `a` and `b` until either side
/// reaches EOF or errors.
pub async fn splice(a: TcpStream, b: TcpStream, buf_size: usize) {
    let (ar, aw) = a.into_split();
    let (br, bw) = b.into_split();

    tokio::join!(pump(ar, bw, buf_size), pump(br, aw, buf_size));
}
