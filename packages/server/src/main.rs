#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geo dashboard API server binary.

use actix_web::web;
use clap::Parser;
use geo_dashboard_models::config::DashboardConfig;
use geo_dashboard_server::{AppState, ServerArgs, build_backend, run_server};
use geo_dashboard_sync::{LogSink, spawn_dashboard};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let args = ServerArgs::parse();

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading dashboard definition from {}", path.display());
            DashboardConfig::load(path).map_err(std::io::Error::other)?
        }
        None => DashboardConfig::embedded_default(),
    };
    log::info!("Dashboard: {} ({})", config.title, config.id);

    let api_key = std::env::var("CARTO_API_KEY").ok();
    let backend = build_backend(&args, &config, api_key).map_err(std::io::Error::other)?;
    let dashboard = spawn_dashboard(config, backend, LogSink).map_err(std::io::Error::other)?;

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    run_server(web::Data::new(AppState { dashboard }), bind_addr, port).await
}
