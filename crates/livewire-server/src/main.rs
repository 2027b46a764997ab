mod config;

use clap::Parser;
use livewire::prelude::*;

use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .init();

    tracing::info!(
        bind = %config.bind,
        format = %config.format,
        "livewired v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let server = LivewireServer::builder()
        .bind(&config.bind)
        .format(config.format)
        .drain_timeout(config.drain_timeout())
        .build(StdoutSink)
        .await?;

    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening");
    }
    println!("Starting server... Press CTRL+C to stop.");

    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal, cleaning up..."),
            Err(e) => {
                tracing::error!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    server.run_until(shutdown_signal).await?;
    Ok(())
}
