//! Signed connection URLs
//!
//! The remote service authorizes the WebSocket handshake with an HMAC-SHA256
//! signature over a virtual request (`host`, `date`, request line). The
//! signature embeds the exact timestamp, so a URL is built right before each
//! connection attempt and never reused.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNING_ALGORITHM: &str = "hmac-sha256";
pub const SIGNED_HEADERS: &str = "host date request-line";

/// A connection URL authorized for a single handshake attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedConnectionUrl {
    base_url: Url,
    authorization: String,
    date: String,
    host: String,
}

impl SignedConnectionUrl {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base64-encoded authorization descriptor.
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    /// RFC-1123 timestamp the signature was computed over.
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full URL with `authorization`, `date` and `host` query parameters.
    pub fn to_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("authorization", &self.authorization)
            .append_pair("date", &self.date)
            .append_pair("host", &self.host);
        url
    }
}

/// Build a signed connection URL for `now`.
///
/// Pure function of its inputs: the same credentials and instant always
/// yield the same token.
pub fn build_connection_url(credentials: &Credentials, now: DateTime<Utc>) -> SignedConnectionUrl {
    let endpoint = credentials.endpoint();
    let host = authority(endpoint);
    let date = format_rfc1123(now);
    let request_line = format!("GET {} HTTP/1.1", endpoint.path());

    let payload = format!("host: {host}\ndate: {date}\n{request_line}");
    let signature = sign(credentials.api_secret(), &payload);

    let descriptor = format!(
        "api_key=\"{}\", algorithm=\"{}\", headers=\"{}\", signature=\"{}\"",
        credentials.api_key(),
        SIGNING_ALGORITHM,
        SIGNED_HEADERS,
        signature
    );

    SignedConnectionUrl {
        base_url: endpoint.clone(),
        authorization: BASE64.encode(descriptor),
        date,
        host,
    }
}

/// `Thu, 01 Jan 2026 00:00:00 GMT`
pub fn format_rfc1123(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Base64 of HMAC-SHA256(secret, payload).
pub fn sign(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

// Host plus explicit port; scheme and path stripped.
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
