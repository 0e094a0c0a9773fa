use tracing::info;
use tracing_subscriber::EnvFilter;

use drive_portal::config::ServerSettings;
use drive_portal::google_drive::DriveConnector;
use drive_portal::prelude::*;
use drive_portal::server::{serve, App};
use drive_portal::service::DriveService;
use drive_portal::session::BearerSession;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let settings = ServerSettings::load()?;
    let connector = DriveConnector::new(settings.list_page_size());
    let service = DriveService::new(connector, settings.storage_limit());
    let app = App::new(service, BearerSession);
    serve(settings.bind_addr()?, app).await?;
    info!("exiting gracefully");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_line_number(true)
        .init();
    info!("tracing initialized");
}
