use anyhow::Context;
use order_panel_lib::{diagnostics, PanelConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PanelConfig::from_env().context("invalid order panel configuration")?;

    // Keep the guard alive until exit; dropping it flushes the file log.
    let _log_guard = diagnostics::init_logging(config.log_dir.as_deref());
    info!(about = %diagnostics::about_info(), "Order panel v{}", env!("CARGO_PKG_VERSION"));

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    order_panel_lib::run(config, ctrl_c)
        .await
        .context("order panel stopped with an error")
}
