//! Feeding routes.
//!
//! # Endpoints
//!
//! ### `GET /api/feedNow`
//! Queue one dispense cycle with the configured repeat count. Replies
//! `feeding` before the servo moves.
//!
//! ### `GET /api/setFeedTimes?data=[{"h":8,"m":0,"r":2},...]`
//! Replace the whole schedule. Without `data`, the two-slot form
//! `h1,m1,r1,h2,m2,r2` is accepted instead.
//!
//! ### `GET /api/setAngle?angle=90`
//! Move the servo straight to an angle. Ignored while dispensing.

use axum::{
    extract::{RawQuery, State},
    routing::get,
    Router,
};
use feeder_protocol::query::feed_times;
use feeder_protocol::replies;
use tracing::debug;

use super::params;
use crate::{ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feedNow", get(feed_now))
        .route("/setFeedTimes", get(set_feed_times))
        .route("/setAngle", get(set_angle))
}

/// GET /api/feedNow
async fn feed_now(State(handle): State<AppState>) -> Result<&'static str, ApiError> {
    handle.feed_now().await?;
    Ok(replies::FEEDING)
}

/// GET /api/setFeedTimes
async fn set_feed_times(
    State(handle): State<AppState>,
    query: RawQuery,
) -> Result<&'static str, ApiError> {
    let slots = feed_times(&params(query));
    debug!(count = slots.len(), "Replacing feeding schedule");
    handle.replace_schedule(slots).await?;
    Ok(replies::OK)
}

/// GET /api/setAngle
async fn set_angle(
    State(handle): State<AppState>,
    query: RawQuery,
) -> Result<&'static str, ApiError> {
    if let Some(angle) = params(query).int("angle") {
        if !handle.set_angle(angle).await? {
            debug!(angle, "Angle request ignored while dispensing");
        }
    }
    Ok(replies::OK)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{app, eventually, get, get_json};
    use axum::http::StatusCode;
    use feeder_core::schedule::keys;
    use feeder_core::SettingsStorage;

    #[tokio::test]
    async fn test_feed_now_replies_before_dispensing() {
        let app = app();
        let (status, body) = get(&app.router, "/api/feedNow").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "feeding");
        assert!(eventually(|| app.servo.visits(180) == 1).await);
    }

    #[tokio::test]
    async fn test_set_feed_times_from_data() {
        let app = app();
        let uri = "/api/setFeedTimes?data=%5B%7B%22h%22%3A7%2C%22m%22%3A5%2C%22r%22%3A2%7D%2C%7B%22h%22%3A30%2C%22m%22%3A0%7D%5D";
        let (status, body) = get(&app.router, uri).await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));

        let status = get_json(&app.router, "/api/status").await;
        assert_eq!(status["feedTimes"].as_array().map(Vec::len), Some(2));
        assert_eq!(status["feedTimes"][0]["r"], 2);
        assert_eq!(status["feedTimes"][1]["h"], 23);
        assert_eq!(status["feedHour2"], 23);
        assert_eq!(app.storage.get_i32(keys::SLOT_COUNT).unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_set_feed_times_legacy_form() {
        let app = app();
        let (status, _) = get(&app.router, "/api/setFeedTimes?h1=6&m1=30&h2=18&m2=45&r2=3").await;
        assert_eq!(status, StatusCode::OK);

        let status = get_json(&app.router, "/api/status").await;
        assert_eq!(status["feedTimes"][0]["h"], 6);
        assert_eq!(status["feedTimes"][0]["r"], 1);
        assert_eq!(status["feedMinute2"], 45);
        assert_eq!(status["feedRepeats2"], 3);
    }

    #[tokio::test]
    async fn test_set_angle_clamps() {
        let app = app();
        let (_, body) = get(&app.router, "/api/setAngle?angle=250").await;
        assert_eq!(body, "ok");
        let status = get_json(&app.router, "/api/status").await;
        assert_eq!(status["currentAngle"], 180);
    }
}
