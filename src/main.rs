use anyhow::Context;
use backend_infra::utils::logger;
use backend_infra::{bootstrap, CliArgs, ClientRegistry};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 先初始化日誌，之後的元件都透過它輸出
    logger::init_global(args.log_config()).context("failed to initialise logging")?;

    tracing::info!(config = %args.config, "Starting backend");

    let registry = ClientRegistry::new();
    let clients = match bootstrap(&args.config, &registry).await {
        Ok(clients) => clients,
        Err(e) => {
            // 任一客戶端失敗都不繼續執行
            tracing::error!(error = %e, kind = ?e.kind(), "❌ 初始化客戶端失敗");
            std::process::exit(1);
        }
    };

    tracing::info!("✅ All clients connected, waiting for shutdown signal");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }

    clients.shutdown().await.context("client shutdown failed")?;
    Ok(())
}
