//! Device setting routes.
//!
//! A missing parameter leaves the setting unchanged. Present values are
//! read leniently and clamped by the controller.

use axum::{
    extract::{RawQuery, State},
    routing::get,
    Router,
};
use feeder_protocol::replies;

use super::params;
use crate::{ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/setRepeats", get(set_repeats))
        .route("/setSpeed", get(set_speed))
        .route("/setPowerMode", get(set_power_mode))
}

/// GET /api/setRepeats?repeats=2
async fn set_repeats(
    State(handle): State<AppState>,
    query: RawQuery,
) -> Result<&'static str, ApiError> {
    if let Some(repeats) = params(query).int("repeats") {
        handle.set_repeats(repeats).await?;
    }
    Ok(replies::OK)
}

/// GET /api/setSpeed?speed=12.5
async fn set_speed(
    State(handle): State<AppState>,
    query: RawQuery,
) -> Result<&'static str, ApiError> {
    if let Some(speed) = params(query).float("speed") {
        handle.set_speed(speed).await?;
    }
    Ok(replies::OK)
}

/// GET /api/setPowerMode?enabled=true
async fn set_power_mode(
    State(handle): State<AppState>,
    query: RawQuery,
) -> Result<&'static str, ApiError> {
    if let Some(enabled) = params(query).flag("enabled") {
        handle.set_power_save(enabled).await?;
    }
    Ok(replies::OK)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{app, get, get_json};
    use feeder_core::SettingsStorage;

    #[tokio::test]
    async fn test_settings_are_clamped_and_persisted() {
        let app = app();
        get(&app.router, "/api/setSpeed?speed=42").await;
        get(&app.router, "/api/setRepeats?repeats=0").await;
        get(&app.router, "/api/setPowerMode?enabled=false").await;

        let status = get_json(&app.router, "/api/status").await;
        assert_eq!(status["speed"], 20.0);
        assert_eq!(status["feedRepeats"], 1);
        assert_eq!(status["powerSaveMode"], false);
        assert_eq!(app.storage.get_f32("speed").unwrap(), Some(20.0));
        assert_eq!(app.storage.get_bool("powerSaveMode").unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_missing_parameter_keeps_value() {
        let app = app();
        get(&app.router, "/api/setRepeats?repeats=3").await;
        let (_, body) = get(&app.router, "/api/setRepeats").await;
        assert_eq!(body, "ok");
        assert_eq!(get_json(&app.router, "/api/status").await["feedRepeats"], 3);
    }

    #[tokio::test]
    async fn test_lenient_speed() {
        let app = app();
        get(&app.router, "/api/setSpeed?speed=7.5abc").await;
        assert_eq!(get_json(&app.router, "/api/status").await["speed"], 7.5);
    }
}
