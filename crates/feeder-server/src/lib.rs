//! # feeder-server
//!
//! Runs the fish feeder on a tokio host.
//!
//! A single owner thread holds the [`feeder_core::Feeder`] and runs its poll
//! loop; async code talks to it through a [`FeederHandle`]. Simulated
//! hardware and a JSON-file settings store let the whole device run on a
//! Linux desktop.

pub mod server;
pub mod sim;
pub mod storage;

pub use server::{FeederCommand, FeederHandle, FeederServer, Hardware, ServerConfig, ServerError};
pub use storage::FileSettings;
