use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use nocache_server::config::{AppState, Config};
use nocache_server::error::StartupError;
use nocache_server::{logger, server};

/// How long in-flight file reads get to finish after shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[FATAL] {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), StartupError> {
    // Optional config file path as the only argument, `config.toml` (or none) otherwise
    let cfg = match std::env::args().nth(1) {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    logger::init(&cfg).map_err(StartupError::Logger)?;

    // Build the Tokio runtime, sizing it from the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build().map_err(StartupError::Runtime)?;

    let result = runtime.block_on(async_main(cfg));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn async_main(cfg: Config) -> Result<(), StartupError> {
    let addr = cfg.get_socket_addr()?;
    let state = Arc::new(AppState::new(cfg)?);
    let listener = server::create_listener(addr)?;

    let bound = listener.local_addr().unwrap_or(addr);
    logger::log_server_start(&bound, state.root.path(), &state.config);

    server::serve(listener, state, async {
        let reason = server::shutdown_signal().await;
        logger::log_shutdown(reason);
    })
    .await;

    Ok(())
}
