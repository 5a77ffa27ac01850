use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "fsh-client", about = "Forward, port-forward and port-listen clients")]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Log level, passed straight to the process-wide logger.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: log::Level,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register with the broker and serve tunnel requests against a
    /// local target, reconnecting the control loop is left to the
    /// caller's process supervisor.
    Forward {
        #[arg(long)]
        server: SocketAddr,
        #[arg(long)]
        target: SocketAddr,
        /// Pre-chosen token to request; omit to let the server assign one.
        #[arg(long, value_parser = parse_token)]
        token: Option<codec::Token>,
    },

    /// Dial the broker once, announce `token`, and splice against a
    /// locally accepted connection on stdin/stdout-free scripting use.
    PortForward {
        #[arg(long)]
        server: SocketAddr,
        #[arg(long, value_parser = parse_token)]
        token: codec::Token,
        #[arg(long)]
        target: SocketAddr,
    },

    /// Bind `bind` and spawn a connect-client against the broker for
    /// every accepted local connection.
    PortListen {
        #[arg(long)]
        server: SocketAddr,
        #[arg(long, value_parser = parse_token)]
        token: codec::Token,
        #[arg(long)]
        bind: SocketAddr,
    },
}

fn parse_token(s: &str) -> Result<codec::Token, String> {
    codec::Token::from_str(s).map_err(|_| format!("invalid token: {s}"))
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }
}
