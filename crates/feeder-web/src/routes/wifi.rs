//! WiFi provisioning routes.
//!
//! `setWiFi`, `forgetWiFi` and `reconnectWiFi` reply before the radio
//! changes role, since the client may lose its connection when it does.

use axum::{
    extract::{RawQuery, State},
    response::Json,
    routing::get,
    Router,
};
use feeder_protocol::query::wifi_credentials;
use feeder_protocol::{replies, ScanRecord};

use super::params;
use crate::{ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/setWiFi", get(set_wifi))
        .route("/forgetWiFi", get(forget_wifi))
        .route("/reconnectWiFi", get(reconnect_wifi))
        .route("/scanWiFi", get(scan_wifi))
}

/// GET /api/setWiFi?ssid=Home&password=secret
async fn set_wifi(
    State(handle): State<AppState>,
    query: RawQuery,
) -> Result<&'static str, ApiError> {
    let (ssid, password) =
        wifi_credentials(&params(query)).ok_or(ApiError::BadRequest(replies::MISSING_WIFI_PARAMS))?;
    handle.set_wifi(ssid, password).await?;
    Ok(replies::OK)
}

/// GET /api/forgetWiFi
async fn forget_wifi(State(handle): State<AppState>) -> Result<&'static str, ApiError> {
    handle.forget_wifi().await?;
    Ok(replies::OK)
}

/// GET /api/reconnectWiFi
async fn reconnect_wifi(State(handle): State<AppState>) -> Result<&'static str, ApiError> {
    handle.reconnect_wifi().await?;
    Ok(replies::OK)
}

/// GET /api/scanWiFi
async fn scan_wifi(State(handle): State<AppState>) -> Result<Json<Vec<ScanRecord>>, ApiError> {
    let networks = handle.scan_wifi().await?;
    Ok(Json(networks.into_iter().map(ScanRecord::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{app, get, get_json};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_set_wifi_requires_both_parameters() {
        let app = app();
        let (status, body) = get(&app.router, "/api/setWiFi?ssid=Home").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Missing ssid or password");
    }

    #[tokio::test]
    async fn test_join_and_forget() {
        let app = app();
        let (status, body) = get(&app.router, "/api/setWiFi?ssid=Home&password=secret").await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));

        let status = get_json(&app.router, "/api/status").await;
        assert_eq!(status["wifiSSID"], "Home");
        assert_eq!(status["isAPMode"], false);
        assert_eq!(status["wifiIP"], "127.0.0.1");

        get(&app.router, "/api/forgetWiFi").await;
        let status = get_json(&app.router, "/api/status").await;
        assert_eq!(status["isAPMode"], true);
        assert_eq!(status["wifiSSID"], "");
    }

    #[tokio::test]
    async fn test_scan() {
        let app = app();
        let networks = get_json(&app.router, "/api/scanWiFi").await;
        assert_eq!(networks[0]["ssid"], "Home");
        assert_eq!(networks[0]["encrypted"], true);
        assert!(networks[0]["rssi"].is_i64());
    }
}
