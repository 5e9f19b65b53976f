use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    codes::WeatherCodeTable,
    error::{Error, Result},
    model::{Coordinates, WeatherReport, WeatherSnapshot},
    provider::truncate_body,
};

use super::WeatherSource;

/// Variables requested from the `current` block of the forecast endpoint.
pub const CURRENT_FIELDS: &str = "temperature_2m,is_day,apparent_temperature,precipitation,rain,\
showers,snowfall,cloud_cover,wind_speed_10m,wind_direction_10m,wind_gusts_10m,\
relative_humidity_2m,weather_code,pressure_msl,surface_pressure";

#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    http: Client,
    forecast_url: Url,
    codes: &'static WeatherCodeTable,
}

impl OpenMeteoSource {
    pub fn new(
        http: Client,
        base_url: &str,
        codes: &'static WeatherCodeTable,
    ) -> anyhow::Result<Self> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        let forecast_url = Url::parse(&base)
            .and_then(|url| url.join("v1/forecast"))
            .with_context(|| format!("Invalid weather base URL: {base_url}"))?;

        Ok(Self { http, forecast_url, codes })
    }

    /// Fetch current conditions. `(0, 0)` is rejected with [`Error::NoLocation`]
    /// before any request is made.
    pub async fn fetch(&self, coords: Coordinates) -> Result<WeatherSnapshot> {
        if coords.is_unset() {
            return Err(Error::NoLocation);
        }

        let latitude = coords.latitude.to_string();
        let longitude = coords.longitude.to_string();

        tracing::debug!(%latitude, %longitude, "Requesting current weather");

        let res = self
            .http
            .get(self.forecast_url.clone())
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", CURRENT_FIELDS),
                ("timezone", "auto"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            tracing::debug!(%status, body = truncate_body(&body), "Forecast request rejected");
            return Err(Error::UpstreamStatus(status));
        }

        let parsed: OmResponse = serde_json::from_str(&body).map_err(Error::Decode)?;

        self.snapshot(parsed)
    }

    /// Fails with [`Error::UnknownCode`] when the code is not in the table.
    fn snapshot(&self, parsed: OmResponse) -> Result<WeatherSnapshot> {
        let current = parsed.current;
        let code = current.weather_code;
        let is_day = current.is_day.unwrap_or_default() == 1;

        let Some(cond) = self.codes.lookup(code, is_day) else {
            return Err(Error::UnknownCode { code, is_day });
        };

        Ok(WeatherSnapshot {
            description: cond.description.clone(),
            code,
            is_day,
            temp_c: current.temperature_2m.unwrap_or_default(),
            apparent_c: current.apparent_temperature.unwrap_or_default(),
            wind_kmh: current.wind_speed_10m.unwrap_or_default(),
            gust_kmh: current.wind_gusts_10m.unwrap_or_default(),
            wind_direction_deg: current.wind_direction_10m.unwrap_or_default(),
            humidity: current.relative_humidity_2m.unwrap_or_default(),
            pressure_hpa: current.pressure_msl.unwrap_or_default(),
            precipitation_mm: current.precipitation.unwrap_or_default(),
            cloud_cover: current.cloud_cover.unwrap_or_default(),
            image: cond.image.clone(),
            observed_at: current.time.as_deref().and_then(parse_local_time),
            timezone: parsed.timezone,
        })
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoSource {
    async fn current(&self, coords: Coordinates) -> WeatherReport {
        match self.fetch(coords).await {
            Ok(snapshot) => snapshot.into(),
            Err(Error::NoLocation) => {
                tracing::debug!("No coordinates available, weather is unknown");
                WeatherReport::Unknown
            }
            Err(Error::UnknownCode { code, is_day }) => {
                tracing::warn!(code, is_day, "Weather code not in table, reporting Unknown");
                WeatherReport::Unknown
            }
            Err(e) => {
                tracing::warn!(
                    latitude = coords.latitude,
                    longitude = coords.longitude,
                    "Weather lookup failed, reporting Unknown: {e}"
                );
                WeatherReport::Unknown
            }
        }
    }
}

/// Open-Meteo reports local time as `2024-05-01T14:15` (no seconds, no offset).
fn parse_local_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| value.parse())
        .ok()
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    timezone: Option<String>,
    current: OmCurrent,
}

/// Open-Meteo sends `null` for variables a model has no data for, so every
/// measurement is optional and falls back to zero.
#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: Option<String>,
    weather_code: i32,
    #[serde(default)]
    is_day: Option<i32>,
    #[serde(default)]
    temperature_2m: Option<f64>,
    #[serde(default)]
    apparent_temperature: Option<f64>,
    #[serde(default)]
    precipitation: Option<f64>,
    #[serde(default)]
    cloud_cover: Option<i32>,
    #[serde(default)]
    wind_speed_10m: Option<f64>,
    #[serde(default)]
    wind_direction_10m: Option<i32>,
    #[serde(default)]
    wind_gusts_10m: Option<f64>,
    #[serde(default)]
    relative_humidity_2m: Option<i32>,
    #[serde(default)]
    pressure_msl: Option<f64>,
}
