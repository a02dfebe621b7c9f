//! [`RemoteSource`](meshsync_engine::RemoteSource) backed by the Netmaker REST API.

pub mod client;
pub mod error;
pub mod wire;

pub use client::{ClientConfig, NetmakerClient};
pub use error::ClientError;
