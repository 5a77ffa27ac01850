use std::sync::Arc;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(fsh_server::config::Config::load());
    logging::init(config.log_level)?;
    fsh_server::server_main(config).await
}
