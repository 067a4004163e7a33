//! HTTP route handlers.
//!
//! Handlers read their arguments with [`QueryParams`] so query strings are
//! interpreted exactly as on the device.

pub mod feeding;
pub mod settings;
pub mod wifi;

use axum::{
    extract::{RawQuery, State},
    response::Json,
    routing::get,
    Router,
};
use feeder_protocol::{QueryParams, StatusResponse};
use tower_http::cors::CorsLayer;

use crate::{ApiError, AppState};

/// Create the `/api` router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .merge(feeding::routes())
        .merge(settings::routes())
        .merge(wifi::routes())
}

/// GET /api/status
async fn status(State(handle): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    Ok(Json(handle.status().await?))
}

pub(crate) fn params(RawQuery(query): RawQuery) -> QueryParams {
    query.as_deref().map(QueryParams::parse).unwrap_or_default()
}
