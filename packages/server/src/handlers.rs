//! HTTP handler functions for the geo dashboard API.

use actix_web::{HttpResponse, web};
use geo_dashboard_models::{CircleSelection, GeometryEdit};
use geo_dashboard_server_models::{
    ApiAccepted, ApiError, ApiHealth, CategoryRequest, CommitRequest, EditRequest,
};
use geo_dashboard_sync::DashboardError;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/state`
///
/// Returns the dashboard snapshot: status, caption, selection, current
/// query, bar chart and choropleth frame.
pub async fn state(state: web::Data<AppState>) -> HttpResponse {
    match state.dashboard.snapshot().await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/regions`
///
/// Returns the loaded region shapes as a `GeoJSON` `FeatureCollection`.
pub async fn regions(state: web::Data<AppState>) -> HttpResponse {
    match state.dashboard.regions().await {
        Ok(collection) => HttpResponse::Ok().json(collection),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/events/edit`
///
/// An edit-move or edit-resize event. Only refreshes the caption.
pub async fn edit(state: web::Data<AppState>, body: web::Json<EditRequest>) -> HttpResponse {
    let edit = GeometryEdit::from(body.into_inner());
    if let Err(e) = edit.circle.validate() {
        return HttpResponse::BadRequest().json(ApiError::new(format!("Invalid geometry: {e}")));
    }

    match state.dashboard.edit(edit).await {
        Ok(()) => HttpResponse::Accepted().finish(),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/events/commit`
///
/// The commit gesture. Issues a query only if an edit preceded it.
pub async fn commit(state: web::Data<AppState>, body: web::Json<CommitRequest>) -> HttpResponse {
    let circle = CircleSelection::from(body.into_inner().circle);
    match state.dashboard.commit(circle).await {
        Ok(generation) => HttpResponse::Accepted().json(ApiAccepted { generation }),
        Err(e) => error_response(&e),
    }
}

/// `POST /api/events/category`
///
/// A click on a category bar.
pub async fn category(
    state: web::Data<AppState>,
    body: web::Json<CategoryRequest>,
) -> HttpResponse {
    match state.dashboard.select_category(body.into_inner().key).await {
        Ok(generation) => HttpResponse::Accepted().json(ApiAccepted { generation }),
        Err(e) => error_response(&e),
    }
}

fn error_response(e: &DashboardError) -> HttpResponse {
    match e {
        DashboardError::Query(_) => HttpResponse::BadRequest().json(ApiError::new(e.to_string())),
        DashboardError::Closed => {
            log::error!("Dashboard task is gone");
            HttpResponse::ServiceUnavailable().json(ApiError::new(e.to_string()))
        }
        DashboardError::Config(_) => {
            log::error!("Unexpected dashboard error: {e}");
            HttpResponse::InternalServerError().json(ApiError::new(e.to_string()))
        }
    }
}
