use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

mod archive;
mod config;
mod handler;
mod http;
mod logger;
mod server;
mod store;

/// Time given to blocking archive walks to notice a closed connection
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = config::Cli::parse();
    let cfg = config::Config::load(&cli)?;
    logger::init(&cfg)?;

    // Create Tokio runtime, thread count from workers config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    let store = store::StoreRoot::open(&cfg.storage)?;
    let result = runtime.block_on(async_main(cfg, store.path().to_path_buf()));

    // Stop walks and uploads before the root can disappear
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    store.close();
    result
}

async fn async_main(cfg: config::Config, root: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::bind_listener(addr, cfg.server.backlog)?;
    let bound_addr = listener.local_addr()?;

    let shutdown = Arc::new(Notify::new());
    server::signal::start_signal_handler(Arc::clone(&shutdown))?;

    logger::log_server_start(&bound_addr, &root, &cfg);
    let state = Arc::new(config::AppState::new(cfg, &root));
    server::start_server_loop(listener, state, shutdown).await;
    Ok(())
}
