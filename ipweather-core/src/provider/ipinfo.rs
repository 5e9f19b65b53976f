use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::net::IpAddr;

use crate::{
    config::GeolocationConfig,
    error::{Error, Result},
    model::{Coordinates, GeoLocation},
    provider::truncate_body,
};

use super::GeoLocator;

/// Client for ipinfo-style `GET /{ip}/json` geolocation endpoints.
#[derive(Debug, Clone)]
pub struct IpInfoLocator {
    http: Client,
    base_url: Url,
    token: Option<String>,
    fallback: Coordinates,
}

impl IpInfoLocator {
    pub fn new(http: Client, config: &GeolocationConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid geolocation base URL: {}", config.base_url))?;

        if base_url.cannot_be_a_base() {
            bail!("Geolocation base URL cannot carry a path: {}", config.base_url);
        }

        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
            fallback: config.fallback(),
        })
    }

    fn lookup_url(&self, ip: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(ip).push("json");
        }
        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair("token", token);
        }
        url
    }

    pub async fn fetch(&self, ip: &str) -> Result<GeoLocation> {
        tracing::debug!(ip, "Requesting IP geolocation");

        let res = self.http.get(self.lookup_url(ip)).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if status != StatusCode::OK {
            tracing::warn!(
                ip,
                %status,
                body = truncate_body(&body),
                "Geolocation provider returned an error status"
            );
            return Err(Error::UpstreamStatus(status));
        }

        let mut geo: GeoLocation = serde_json::from_str(&body).map_err(Error::Decode)?;
        self.resolve_coordinates(ip, &mut geo);

        Ok(geo)
    }

    fn resolve_coordinates(&self, ip: &str, geo: &mut GeoLocation) {
        // Local clients have no public location; give them a fixed one for testing.
        if geo.loc_str().is_none() && is_private_or_loopback(ip) {
            tracing::debug!(ip, "Private address without location, using fallback coordinates");
            geo.loc = Some(format!("{},{}", self.fallback.latitude, self.fallback.longitude));
        }

        let Some(loc) = geo.loc_str() else {
            return;
        };

        match Coordinates::parse_loc(loc) {
            Some(coords) => geo.set_coordinates(coords),
            None => tracing::warn!(loc, "Failed to parse loc, treating coordinates as absent"),
        }
    }
}

#[async_trait]
impl GeoLocator for IpInfoLocator {
    async fn locate(&self, ip: &str) -> Result<GeoLocation> {
        self.fetch(ip).await
    }
}

/// Loopback, `10/8`, `172.16/12` and `192.168/16`, including IPv4-mapped IPv6 forms.
pub fn is_private_or_loopback(ip: &str) -> bool {
    match ip.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_loopback() || v4.is_private(),
        Ok(IpAddr::V6(v6)) => {
            v6.is_loopback()
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| v4.is_loopback() || v4.is_private())
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn locator(server: &MockServer) -> IpInfoLocator {
        let config = GeolocationConfig {
            base_url: server.uri(),
            ..GeolocationConfig::default()
        };
        IpInfoLocator::new(Client::new(), &config).expect("valid base url")
    }

    #[tokio::test]
    async fn parses_loc_into_coordinates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/8.8.8.8/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ip": "8.8.8.8",
                "city": "Mountain View",
                "region": "California",
                "country": "US",
                "loc": "37.4056,-122.0775",
                "timezone": "America/Los_Angeles"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let geo = locator(&server).fetch("8.8.8.8").await.unwrap();

        assert_eq!(geo.city.as_deref(), Some("Mountain View"));
        assert_eq!(geo.timezone.as_deref(), Some("America/Los_Angeles"));
        assert_eq!(geo.coordinates(), Coordinates::new(37.4056, -122.0775));
    }

    #[tokio::test]
    async fn non_200_is_upstream_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = locator(&server).fetch("1.1.1.1").await.unwrap_err();
        assert!(matches!(err, Error::UpstreamStatus(s) if s == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = locator(&server).fetch("1.1.1.1").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn malformed_loc_leaves_coordinates_unset() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"loc": "north,west"})),
            )
            .mount(&server)
            .await;

        let geo = locator(&server).fetch("1.1.1.1").await.unwrap();
        assert!(geo.coordinates().is_unset());
        assert_eq!(geo.loc.as_deref(), Some("north,west"));
    }

    #[tokio::test]
    async fn private_ip_without_loc_gets_fallback() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/192.168.1.20/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ip": "192.168.1.20",
                "bogon": true
            })))
            .mount(&server)
            .await;

        let geo = locator(&server).fetch("192.168.1.20").await.unwrap();
        assert_eq!(geo.coordinates(), Coordinates::new(0.5167, 101.4417));
        assert_eq!(geo.bogon, Some(true));
    }

    #[tokio::test]
    async fn public_ip_without_loc_stays_unset() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ip": "9.9.9.9"})))
            .mount(&server)
            .await;

        let geo = locator(&server).fetch("9.9.9.9").await.unwrap();
        assert!(geo.coordinates().is_unset());
    }

    #[tokio::test]
    async fn token_is_sent_as_query_parameter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/8.8.4.4/json"))
            .and(query_param("token", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"loc": "1,2"})))
            .expect(1)
            .mount(&server)
            .await;

        let config = GeolocationConfig {
            base_url: server.uri(),
            token: Some("abc123".into()),
            ..GeolocationConfig::default()
        };
        let geo = IpInfoLocator::new(Client::new(), &config)
            .unwrap()
            .fetch("8.8.4.4")
            .await
            .unwrap();

        assert_eq!(geo.coordinates(), Coordinates::new(1.0, 2.0));
    }

    #[test]
    fn lookup_url_escapes_the_ip_segment() {
        let config = GeolocationConfig {
            base_url: "https://geo.example".into(),
            ..GeolocationConfig::default()
        };
        let locator = IpInfoLocator::new(Client::new(), &config).unwrap();

        let url = locator.lookup_url("1.2.3.4/../admin?x=1");
        assert_eq!(url.host_str(), Some("geo.example"));
        assert!(url.path().ends_with("/json"));
        assert!(url.query().is_none());
    }

    #[test]
    fn rejects_unusable_base_url() {
        let config = GeolocationConfig {
            base_url: "not a url".into(),
            ..GeolocationConfig::default()
        };
        assert!(IpInfoLocator::new(Client::new(), &config).is_err());
    }

    #[test]
    fn classifies_private_and_loopback_addresses() {
        for ip in ["127.0.0.1", "10.1.2.3", "172.16.0.1", "172.31.255.255", "192.168.0.10", "::1", "::ffff:10.0.0.1"] {
            assert!(is_private_or_loopback(ip), "{ip} should be private");
        }
        for ip in ["8.8.8.8", "172.32.0.1", "192.169.0.1", "2001:4860:4860::8888", "garbage", ""] {
            assert!(!is_private_or_loopback(ip), "{ip} should not be private");
        }
    }
}
