use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by the upstream clients and the weather-code table.
#[derive(Debug, Error)]
pub enum Error {
    #[error("request to upstream provider failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream provider responded with status {0}")]
    UpstreamStatus(StatusCode),

    #[error("failed to decode upstream response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to parse weather code table: {0}")]
    CodeTable(#[source] serde_json::Error),

    #[error("no location data for the requested coordinates")]
    NoLocation,

    #[error("weather code {code} (is_day = {is_day}) is not in the code table")]
    UnknownCode { code: i32, is_day: bool },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
