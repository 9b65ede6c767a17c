//! Order Panel
//!
//! Engine behind the back-office order dashboard: polls the order backend for
//! in-progress and concluded orders, normalizes loosely-shaped records into
//! [`order::Order`] values, flags newly arrived orders, and sends orders to
//! invoicing. The presentation layer reads [`refresh::PanelSnapshot`]s and
//! calls back into the [`refresh::RefreshCoordinator`].

use std::sync::Arc;

use tracing::info;

pub mod analytics;
pub mod api;
pub mod config;
pub mod console;
pub mod diagnostics;
pub mod error;
pub mod normalize;
pub mod notify;
pub mod order;
pub mod refresh;

pub use api::{HttpBackend, OrderBackend};
pub use config::PanelConfig;
pub use error::{ApiError, ConfigError};
pub use normalize::normalize;
pub use order::Order;
pub use refresh::{PanelSnapshot, RefreshCoordinator};

/// Build the coordinator described by `config` around the HTTP backend.
pub fn build_coordinator(config: &PanelConfig) -> Result<RefreshCoordinator, ApiError> {
    let backend = HttpBackend::new(config.api_url.clone(), config.request_timeout)?;
    let alerter: Arc<dyn notify::Alerter> = if config.sound_enabled {
        Arc::new(notify::TerminalBell)
    } else {
        Arc::new(notify::Silent)
    };
    let options = refresh::CoordinatorOptions {
        poll_interval: config.poll_interval,
        ..Default::default()
    };
    Ok(RefreshCoordinator::new(Arc::new(backend), alerter, options))
}

/// Poll and serve the console until the operator quits or `shutdown`
/// resolves.
pub async fn run<F>(config: PanelConfig, shutdown: F) -> Result<(), ApiError>
where
    F: std::future::Future<Output = ()>,
{
    info!(
        api_url = %config.api_url,
        poll_secs = config.poll_interval.as_secs(),
        sound = config.sound_enabled,
        "Starting order panel"
    );

    let coordinator = build_coordinator(&config)?;
    let polling = coordinator.start();

    tokio::select! {
        _ = console::run_console(coordinator.clone()) => {}
        _ = shutdown => info!("Shutdown requested"),
    }

    coordinator.shutdown();
    polling.join().await;
    Ok(())
}
