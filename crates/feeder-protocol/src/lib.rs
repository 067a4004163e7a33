//! # feeder-protocol
//!
//! Wire formats of the fish feeder HTTP API.
//!
//! This crate defines the JSON response documents, the tolerant decoder for
//! schedule payloads and the query-parameter rules shared by the Linux
//! (axum) and ESP32 (esp-idf httpd) front ends.

pub mod codec;
pub mod messages;
pub mod query;

pub use codec::{decode_feed_times, encode, encode_status, CodecError};
pub use messages::*;
pub use query::QueryParams;
