use anyhow::Result;
use fsh_client::config::{Command, Config};
use fsh_client::{connect, forward, listen};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();
    logging::init(config.log_level)?;

    match config.command {
        Command::Forward { server, target, token } => forward::run(server, target, token).await,
        Command::PortForward { server, token, target } => connect::run_once(server, token, target).await,
        Command::PortListen { server, token, bind } => listen::run(server, token, bind).await,
    }
}
