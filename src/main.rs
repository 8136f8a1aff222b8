use opsdash::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting opsdash");

    // Load configuration
    let config = startup::load_config()?;

    // Serve the dashboard
    startup::start_server(config).await
}
