use anyhow::Context;
use fgate_kernel::config::load_config;
use fgate_kernel::domain::config::ApiConfig;
use fgate_logger::Logger;
use fgate_server::Server;

#[fgate_runtime::main(io_bound)]
async fn main() -> anyhow::Result<()> {
    // An explicit config path must exist; without one `server.*` is optional.
    let path = std::env::args().nth(1);
    let cfg: ApiConfig = load_config(path).context("Critical: Configuration is malformed")?;

    let _log = Logger::builder()
        .name(env!("CARGO_PKG_NAME"))
        .level_name(&cfg.logging.level)?
        .directory(cfg.logging.directory.clone())
        .json(cfg.logging.json)
        .init()?;

    Server::builder().config(cfg).build().await?.run().await
}
