#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the geo dashboard.
//!
//! Forwards map widget events (edits, commits, category clicks) to a
//! running dashboard session and serves its state as JSON. The session
//! runs against either the Carto SQL API or, given local `GeoJSON` files,
//! the in-memory backend.

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, error, middleware, web};
use clap::Parser;
use geo_dashboard_backend::carto::CartoBackend;
use geo_dashboard_backend::memory::MemoryBackend;
use geo_dashboard_backend::{BackendError, DashboardBackend};
use geo_dashboard_models::config::DashboardConfig;
use geo_dashboard_server_models::ApiError;
use geo_dashboard_sync::DashboardHandle;

/// Command-line options of the server binary.
#[derive(Debug, Parser)]
#[command(name = "geo_dashboard_server", about = "Geo dashboard API server")]
pub struct ServerArgs {
    /// Dashboard definition (TOML); the embedded NYC restaurants
    /// definition is used when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Region shapes `GeoJSON` file; with `--points`, runs offline
    #[arg(long, requires = "points")]
    pub regions: Option<PathBuf>,
    /// Point features `GeoJSON` file; with `--regions`, runs offline
    #[arg(long, requires = "regions")]
    pub points: Option<PathBuf>,
}

/// Shared application state.
pub struct AppState {
    /// The running dashboard session.
    pub dashboard: DashboardHandle,
}

/// Picks the backend: in-memory when both local files are given, the
/// Carto SQL API otherwise. `api_key` overrides the definition's key.
///
/// # Errors
///
/// Returns [`BackendError`] if the local files cannot be loaded.
pub fn build_backend(
    args: &ServerArgs,
    config: &DashboardConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn DashboardBackend>, BackendError> {
    if let (Some(regions), Some(points)) = (&args.regions, &args.points) {
        log::info!(
            "Using in-memory backend ({} / {})",
            regions.display(),
            points.display()
        );
        return Ok(Arc::new(MemoryBackend::from_files(config, regions, points)?));
    }

    log::info!("Using Carto SQL API at {}", config.carto.api_url);
    Ok(Arc::new(CartoBackend::new(config).with_api_key(api_key)))
}

/// Registers the API routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/state", web::get().to(handlers::state))
            .route("/regions", web::get().to(handlers::regions))
            .service(
                web::scope("/events")
                    .route("/edit", web::post().to(handlers::edit))
                    .route("/commit", web::post().to(handlers::commit))
                    .route("/category", web::post().to(handlers::category)),
            ),
    );
}

/// Malformed event bodies get a JSON error body instead of plain text.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(ApiError::new(err.to_string()));
        error::InternalError::from_response(err, response).into()
    })
}

/// Starts the HTTP server for `state`.
///
/// The caller provides the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
pub async fn run_server(
    state: web::Data<AppState>,
    bind_addr: String,
    port: u16,
) -> std::io::Result<()> {
    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
