use crate::{
    Config,
    codes::WeatherCodeTable,
    config::HttpConfig,
    error::Result,
    model::{Coordinates, GeoLocation, WeatherReport},
    provider::{ipinfo::IpInfoLocator, openmeteo::OpenMeteoSource},
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::{fmt::Debug, sync::Arc};

pub mod ipinfo;
pub mod openmeteo;

/// Maps an IP address to an approximate location.
#[async_trait]
pub trait GeoLocator: Send + Sync + Debug {
    async fn locate(&self, ip: &str) -> Result<GeoLocation>;
}

/// Current conditions for a coordinate pair. Implementations degrade to
/// [`WeatherReport::Unknown`] instead of failing.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current(&self, coords: Coordinates) -> WeatherReport;
}

/// Geolocation plus weather for one IP.
#[derive(Debug, Clone, Serialize)]
pub struct Enrichment {
    pub ip_info: GeoLocation,
    pub weather: WeatherReport,
}

/// The pair of upstream providers the service composes.
#[derive(Debug, Clone)]
pub struct Providers {
    pub geo: Arc<dyn GeoLocator>,
    pub weather: Arc<dyn WeatherSource>,
}

impl Providers {
    pub fn new(geo: Arc<dyn GeoLocator>, weather: Arc<dyn WeatherSource>) -> Self {
        Self { geo, weather }
    }

    /// Construct the ipinfo + Open-Meteo pair described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = http_client(&config.http)?;

        let geo = IpInfoLocator::new(http.clone(), &config.geolocation)?;
        let weather =
            OpenMeteoSource::new(http, &config.weather.base_url, WeatherCodeTable::bundled())?;

        Ok(Self::new(Arc::new(geo), Arc::new(weather)))
    }

    /// Locate `ip`, then look up the weather there.
    ///
    /// A geolocation failure is returned as an error; a weather failure is not.
    pub async fn enrich(&self, ip: &str) -> Result<Enrichment> {
        let ip_info = self.geo.locate(ip).await?;
        let weather = self.weather.current(ip_info.coordinates()).await;
        Ok(Enrichment { ip_info, weather })
    }
}

/// Shared outbound client with the configured timeout and user agent.
pub fn http_client(config: &HttpConfig) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")
}

pub(crate) fn truncate_body(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
