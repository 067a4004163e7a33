//! # feeder-web
//!
//! HTTP API for the fish feeder.
//!
//! Every endpoint is a `GET` under `/api/` taking query parameters, so the
//! bundled web UI and plain `curl` calls can drive the device the same way:
//!
//! - `/api/status` - JSON status document
//! - `/api/feedNow`, `/api/setFeedTimes`, `/api/setAngle` - feeding
//! - `/api/setRepeats`, `/api/setSpeed`, `/api/setPowerMode` - settings
//! - `/api/setWiFi`, `/api/forgetWiFi`, `/api/reconnectWiFi`, `/api/scanWiFi` - WiFi
//!
//! ## Usage
//!
//! ```rust,ignore
//! use feeder_web::create_router;
//!
//! let (handle, _thread) = FeederServer::new(config, storage, hardware).spawn()?;
//! let app = create_router(handle);
//!
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::create_router;

/// State shared by all handlers: a handle to the feeder's owner thread.
pub type AppState = feeder_server::FeederHandle;
