use axum::http::HeaderMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

// Hex chars kept from the digest
const FINGERPRINT_LEN: usize = 16;

// Best-guess locale of the caller, for analytics only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub country: String,
    pub language: String,
    pub timezone: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Resolve the client address: first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn user_agent(headers: &HeaderMap) -> &str {
    header_str(headers, "user-agent").unwrap_or("")
}

// Create a request fingerprint (hash of ip + user agent + accept-language)
pub fn request_fingerprint(client_ip: &str, headers: &HeaderMap) -> String {
    let accept_language = header_str(headers, "accept-language").unwrap_or("");

    let mut hasher = Sha256::new();
    hasher.update(client_ip);
    hasher.update(":");
    hasher.update(user_agent(headers));
    hasher.update(":");
    hasher.update(accept_language);

    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

pub fn detect_region(headers: &HeaderMap) -> Region {
    let country = header_str(headers, "cf-ipcountry").unwrap_or("unknown");

    let language = header_str(headers, "accept-language")
        .and_then(|al| al.split(',').next())
        .and_then(|tag| tag.split(';').next())
        .and_then(|tag| tag.split('-').next())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or("en");

    let timezone = header_str(headers, "x-timezone").unwrap_or("UTC");

    Region {
        country: country.to_string(),
        language: language.to_string(),
        timezone: timezone.to_string(),
    }
}
