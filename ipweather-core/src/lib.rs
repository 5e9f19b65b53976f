//! Core library for the `ipweather` service.
//!
//! This crate defines:
//! - Configuration loading and saving
//! - Clients for the IP geolocation and forecast providers
//! - The bundled weather-code table
//! - Shared domain models (locations, snapshots, reports)
//!
//! It is used by `ipweather-server`, but can also be reused by other binaries.

pub mod codes;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;

pub use codes::WeatherCodeTable;
pub use config::Config;
pub use error::{Error, Result};
pub use model::{Coordinates, GeoLocation, WeatherCondition, WeatherReport, WeatherSnapshot};
pub use provider::{Enrichment, GeoLocator, Providers, WeatherSource};
