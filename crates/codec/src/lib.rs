//! ## fsh wire protocol
//!
//! The protocol used between forward-clients, connect-clients and the
//! broker server is a tiny two-byte header optionally followed by a
//! fixed 16-byte token. There is no length prefix: the command alone
//! determines whether a token follows.
//!
//! ```text
//! Header (2 bytes):  u8 version, u8 cmd
//! Token  (16 bytes): raw bytes
//!
//! LOGIN/v1     : Header
//! LOGIN/v2     : Header + Token   (zero token means "assign me one")
//! TOKEN        : Header + Token
//! CONNECT      : Header + Token
//! ACCEPT       : Header + Token
//! KEEP_ALIVE   : Header
//! ```

pub mod token;

#[cfg(feature = "io")]
pub mod io;

pub use token::Token;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Size in bytes of an encoded [`Header`].
pub const HEADER_LEN: usize = 2;

#[derive(Debug)]
pub enum Error {
    /// the peer sent a command byte we don't recognize.
    UnknownCommand(u8),
    /// fewer bytes were available than the frame requires.
    Truncated,
    /// a token string was the wrong length or contained non-hex characters.
    InvalidToken,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCommand(b) => write!(f, "unknown command byte: {b}"),
            Self::Truncated => write!(f, "frame truncated"),
            Self::InvalidToken => write!(f, "malformed token string"),
        }
    }
}

/// The protocol version a peer speaks.
///
/// Version 1 peers do not understand [`Command::KeepAlive`] and must
/// never be sent one. Version 2 adds an optional token on
/// [`Command::Login`] and bidirectional keep-alive frames.
pub type Version = u8;

pub const VERSION_1: Version = 1;
pub const VERSION_2: Version = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Command {
    Login = 1,
    Token = 2,
    Connect = 3,
    Accept = 4,
    KeepAlive = 5,
}

impl Command {
    /// whether this command is followed by a 16-byte token on the wire,
    /// independent of version (LOGIN is the one version-dependent case
    /// and is handled separately by callers).
    pub fn carries_token(self) -> bool {
        matches!(self, Self::Token | Self::Connect | Self::Accept)
    }
}

/// The fixed two-byte frame header shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub cmd: Command,
}

impl Header {
    pub fn new(version: Version, cmd: Command) -> Self {
        Self { version, cmd }
    }

    /// ```
    /// use fsh_codec::{Header, Command, VERSION_1};
    ///
    /// let h = Header::new(VERSION_1, Command::KeepAlive);
    /// assert_eq!(h.encode(), [1, 5]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        [self.version, self.cmd.into()]
    }

    /// Decodes a header from the first [`HEADER_LEN`] bytes of `buf`.
    ///
    /// ```
    /// use fsh_codec::{Header, Command};
    ///
    /// let h = Header::decode(&[2, 3]).unwrap();
    /// assert_eq!(h.cmd, Command::Connect);
    /// assert_eq!(h.version, 2);
    /// ```
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }

        let cmd = Command::try_from(buf[1]).map_err(|_| Error::UnknownCommand(buf[1]))?;
        Ok(Self { version: buf[0], cmd })
    }
}
