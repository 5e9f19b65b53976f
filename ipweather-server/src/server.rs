//! HTTP routes.
//!
//! `GET /` echoes the caller's address, `GET /ip` adds geolocation and
//! `GET /weather` adds current conditions on top of that.

use crate::client_ip;
use anyhow::Context;
use axum::{
    Json, Router,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use ipweather_core::{Enrichment, GeoLocation, Providers, WeatherReport};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state for HTTP handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub providers: Providers,
}

impl AppState {
    pub fn new(providers: Providers) -> Self {
        Self { providers }
    }
}

/// JSON response for `GET /`
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub request_id: String,
    pub client_ip: String,
    pub client_port: String,
}

/// JSON response for `GET /ip`
#[derive(Debug, Serialize)]
pub struct IpResponse {
    pub request_id: String,
    pub client_ip: String,
    pub ip_info: GeoLocation,
}

/// JSON response for `GET /weather`
#[derive(Debug, Serialize)]
pub struct WeatherResponse {
    pub request_id: String,
    pub client_ip: String,
    pub ip_info: GeoLocation,
    pub weather: WeatherReport,
}

/// Failures that end a request early.
#[derive(Debug)]
pub enum ApiError {
    Geolocation(ipweather_core::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Geolocation(e) => {
                tracing::error!("IP geolocation failed: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get IP geolocation").into_response()
            }
        }
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// GET / - Caller address as seen by the server
async fn index(ConnectInfo(peer): ConnectInfo<SocketAddr>, headers: HeaderMap) -> Json<IndexResponse> {
    let remote = peer.to_string();
    let (_, port) = client_ip::split_host_port(&remote);

    Json(IndexResponse {
        request_id: request_id(&headers),
        client_ip: client_ip::resolve(&headers, &remote),
        client_port: port.unwrap_or_default().to_string(),
    })
}

/// GET /ip - Caller address plus geolocation
async fn ip_address(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<IpResponse>, ApiError> {
    let ip = client_ip::resolve(&headers, &peer.to_string());

    let ip_info = state.providers.geo.locate(&ip).await.map_err(ApiError::Geolocation)?;

    Ok(Json(IpResponse {
        request_id: request_id(&headers),
        client_ip: ip,
        ip_info,
    }))
}

/// GET /weather - Caller address, geolocation and current weather
async fn weather(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<WeatherResponse>, ApiError> {
    let ip = client_ip::resolve(&headers, &peer.to_string());

    let Enrichment { ip_info, weather } =
        state.providers.enrich(&ip).await.map_err(ApiError::Geolocation)?;

    tracing::debug!(%ip, weather = weather.description(), "Resolved weather for client");

    Ok(Json(WeatherResponse {
        request_id: request_id(&headers),
        client_ip: ip,
        ip_info,
        weather,
    }))
}

/// Build the router with request IDs, access logging and panic recovery.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ip", get(ip_address))
        .route("/weather", get(weather))
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    serve_with_shutdown(listener, state, shutdown_signal()).await
}

/// Serve until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("Listener has no local address")?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, router(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server terminated with an error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
