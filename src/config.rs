use clap::Parser;
use std::net::SocketAddr;

/// Command-line configuration for the broker server.
///
/// There is no on-disk config file: the server's entire surface is
/// one listen address and a log level, so the derive-based CLI parser
/// alone covers it.
#[derive(Parser, Debug, Clone)]
#[command(name = "fsh-server", about = "Reverse-tunnel broker server")]
pub struct Config {
    /// Address forward-clients and connect-clients both dial.
    #[arg(long, default_value = "0.0.0.0:6400")]
    pub listen: SocketAddr,

    /// Log level, passed straight to the process-wide logger.
    #[arg(long, default_value = "info")]
    pub log_level: log::Level,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparsable_listen_address() {
        let result = Config::try_parse_from(["fsh-server", "--listen", "not-an-address"]);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_a_valid_listen_address() {
        let config = Config::try_parse_from(["fsh-server", "--listen", "127.0.0.1:6400"]).unwrap();
        assert_eq!(config.listen, "127.0.0.1:6400".parse().unwrap());
    }
}
