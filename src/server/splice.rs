use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

async fn pump(mut reader: OwnedReadHalf, mut writer: OwnedWriteHalf, buf_size: usize) -> u64 {
    let mut buf = vec![0u8; buf_size];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };

        if writer.write_all(&buf[..n]).await.is_err() {
            break;
        }

        total += n as u64;
    }

    let _ = writer.shutdown().await;
    total
}

/// Bidirectionally copies bytes between `a` and `b` until either side
/// reaches EOF or errors, using a `buf_size`-byte buffer per
/// direction. Returns `(bytes a->b, bytes b->a)`.
pub async fn splice(a: TcpStream, b: TcpStream, buf_size: usize) -> (u64, u64) {
    let (ar, aw) = a.into_split();
    let (br, bw) = b.into_split();

    tokio::join!(pump(ar, bw, buf_size), pump(br, aw, buf_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client = TcpStream::connect(addr).await.unwrap();
        (client, accept.await.unwrap())
    }

    #[tokio::test]
    async fn relays_bytes_until_close() {
        let (a1, a2) = pair().await;
        let (b1, b2) = pair().await;

        let splice_task = tokio::spawn(splice(a2, b2, 2048));

        let mut a1 = a1;
        let mut b1 = b1;
        a1.write_all(b"PING").await.unwrap();
        let mut buf = [0u8; 4];
        b1.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PING");

        b1.write_all(b"PONG").await.unwrap();
        a1.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PONG");

        drop(a1);
        drop(b1);

        let (sent, received) = splice_task.await.unwrap();
        assert_eq!(sent, 4);
        assert_eq!(received, 4);
    }
}
