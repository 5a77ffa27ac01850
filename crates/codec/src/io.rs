//! Async framing helpers shared by the server and client binaries.
//!
//! Kept behind the `io` feature so that anything only interested in
//! the wire format (and not actually talking to a socket) doesn't pull
//! in tokio.

use crate::{Command, Error, HEADER_LEN, Header, Token, token::TOKEN_LEN};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub async fn read_header<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Header, Error> {
    let mut buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut buf).await.map_err(|_| Error::Truncated)?;
    Header::decode(&buf)
}

pub async fn read_token<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Token, Error> {
    let mut buf = [0u8; TOKEN_LEN];
    reader.read_exact(&mut buf).await.map_err(|_| Error::Truncated)?;
    Ok(Token::from_bytes(buf))
}

pub fn encode_with_token(header: Header, token: Token) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + TOKEN_LEN);
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(token.as_bytes());
    out
}

pub async fn write_header<W: AsyncWrite + Unpin>(writer: &mut W, header: Header) -> std::io::Result<()> {
    writer.write_all(&header.encode()).await
}

pub async fn write_with_token<W: AsyncWrite + Unpin>(
    writer: &mut W,
    header: Header,
    token: Token,
) -> std::io::Result<()> {
    writer.write_all(&encode_with_token(header, token)).await
}

/// Reads one frame's header and, if `cmd` is known to carry a token,
/// the token too.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(Header, Option<Token>), Error> {
    let header = read_header(reader).await?;
    let token = if header.cmd.carries_token() || (header.cmd == Command::Login && header.version >= 2) {
        Some(read_token(reader).await?)
    } else {
        None
    };
    Ok((header, token))
}
