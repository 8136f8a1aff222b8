use crate::components::{ComponentManager, DashboardPoller, Providers};
use crate::config::Config;
use crate::error::Error;
use crate::shutdown;
use crate::web::{self, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and validate the application config
pub fn load_config() -> miette::Result<Arc<Config>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(config)),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Start the components and serve the dashboard until a shutdown signal
pub async fn start_server(config: Arc<Config>) -> miette::Result<()> {
    let providers = Providers::from_config(&config)?;

    let poller = DashboardPoller::new();
    let snapshot = poller.snapshot();

    let mut component_manager = ComponentManager::new(Arc::clone(&config));
    component_manager.register(poller);
    component_manager.init_all(providers.clone()).await?;

    let state = AppState::new(Arc::clone(&config), providers, snapshot)?;
    let app = web::router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(Error::from)?;
    info!("Listening on {}", addr);

    let (shutdown_send, shutdown_recv) = oneshot::channel();
    tokio::spawn(shutdown::handle_signals(shutdown_send));

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_recv.await;
        })
        .await;
    info!("HTTP server stopped");

    if let Err(e) = component_manager.shutdown_all().await {
        error!("Error shutting down components: {:?}", e);
    } else {
        info!("All components shut down successfully");
    }

    served.map_err(Error::from)?;
    Ok(())
}
