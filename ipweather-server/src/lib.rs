//! HTTP front end for `ipweather-core`.
//!
//! Resolves the caller's IP from proxy headers or the socket, then serves
//! geolocation and weather lookups as JSON.

pub mod client_ip;
pub mod server;

pub use server::{AppState, router, serve, serve_with_shutdown};
