//! Best-effort client address extraction.
//!
//! Proxy headers are supplied by the client and can be forged. The result is
//! only fit for geolocation, never for access decisions.

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Pick the originating IP: first `X-Forwarded-For` entry, then `X-Real-IP`,
/// then the host part of the peer address.
pub fn resolve(headers: &HeaderMap, remote_addr: &str) -> String {
    if let Some(xff) = header_str(headers, X_FORWARDED_FOR) {
        let first = xff.split(',').next().unwrap_or_default();
        return first.trim().to_string();
    }

    if let Some(real_ip) = header_str(headers, X_REAL_IP) {
        return real_ip.to_string();
    }

    split_host_port(remote_addr).0.to_string()
}

/// Split `host:port` or `[v6]:port`. Addresses without a port come back unchanged.
pub fn split_host_port(addr: &str) -> (&str, Option<&str>) {
    if let Some(rest) = addr.strip_prefix('[') {
        return match rest.split_once("]:") {
            Some((host, port)) => (host, Some(port)),
            None => (addr, None),
        };
    }

    match addr.split_once(':') {
        Some((host, port)) if !port.contains(':') => (host, Some(port)),
        _ => (addr, None),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}
