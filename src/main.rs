use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};

use crate::{cli::Opts, collector::Collector, crawler::sina::Sina};

pub mod calculation;
pub mod cli;
pub mod collector;
pub mod config;
pub mod crawler;
pub mod declare;
pub mod exporter;
pub mod logging;
pub mod registry;
pub mod util;

#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    if let Err(why) = run().await {
        logging::error_console(format!("{:?}", why));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenv::dotenv().ok();
    let opts = Opts::parse_args()?;
    let settings = opts.apply(config::SETTINGS.clone());

    logging::info_console(format!(
        "Loading {} listing",
        settings.system.exchange
    ));
    let registry = registry::load(settings.system.exchange, &settings.listing).await?;
    logging::info_console(format!("Loaded {} symbols", registry.len()));

    let fetcher = Arc::new(Sina::new(&settings.sina));
    let collector = Arc::new(Collector::new(registry, fetcher, &settings.collector));

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.system.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let msg = format!("Serving metrics on http://{}/metrics", addr);
    logging::info_console(msg.clone());
    logging::info_file_async(msg);

    axum::serve(listener, exporter::router(collector))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    logging::info_console("Stopped".to_string());
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(why) = signal::ctrl_c().await {
            logging::error_console(format!("Failed to listen for ctrl-c because {:?}", why));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(why) => {
                logging::error_console(format!("Failed to listen for SIGTERM because {:?}", why));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
