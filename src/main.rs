use actix_web::{web, App, HttpServer};
use log::info;
use manhua_aggregator::api;
use manhua_aggregator::app_state::AppState;
use manhua_aggregator::config;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::warn!("log4rs.yml not loaded ({}), logging to stderr", e);
    }

    let cfg = config::Config::load();
    info!("Relay fetcher initialized:");
    info!("  Relays: {}", cfg.proxy.relays.len());
    info!("  Relay timeout: {}ms", cfg.proxy.timeout_ms);
    info!("  Per-source timeout: {}ms", cfg.aggregator.source_timeout_ms);

    let state = AppState::from_config(&cfg)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let data = web::Data::new(state);

    let addr = cfg.server.bind.clone();
    let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(api::configure))
        .bind(&addr)?;
    info!("Listening on {}", addr);
    server.run().await
}
