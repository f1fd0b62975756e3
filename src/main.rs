use dotenv::dotenv;
use log::{info, warn};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use warp::Filter;

use gap_dashboard::routes;
use gap_dashboard::services::gaps::GapsClient;
use gap_dashboard::services::refresh::{self, RefreshController, DEFAULT_REFRESH_INTERVAL_SECS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the gap dashboard...");

    // Remote gap endpoint, with a fixed fallback when unset
    let base_url = env::var("GAPS_API_URL").unwrap_or_else(|_| {
        warn!("$GAPS_API_URL not set, defaulting to http://localhost:8000");
        "http://localhost:8000".to_string()
    });
    info!("Using gap endpoint: {}", base_url);

    let port_str = env::var("PORT").unwrap_or_else(|_| {
        warn!("$PORT not set, defaulting to 3030");
        "3030".to_string()
    });
    let port: u16 = port_str.parse()?;
    info!("Using PORT: {}", port);

    let refresh_secs: u64 = env::var("REFRESH_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
    info!("Refresh interval: {}s", refresh_secs);

    // Spawn the fetch/refresh loop; the server only ever reads the state
    let controller = RefreshController::new(GapsClient::new(&base_url)?);
    let handle = refresh::spawn_polling(controller.clone(), Duration::from_secs(refresh_secs));

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    // Set up CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET"]);

    // Set up routes
    let api = routes::routes(controller.state()).with(cors);
    info!("Routes configured successfully with CORS.");

    // Start the server; ctrl-c stops it so the refresh loop gets torn down
    let (bound_addr, server) = warp::serve(api).bind_with_graceful_shutdown(addr, async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
    });
    info!("Starting server on {}", bound_addr);
    server.await;

    handle.shutdown();
    Ok(())
}
