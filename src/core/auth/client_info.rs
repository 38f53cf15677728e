//! Request origin extraction
//!
//! Resolves the client IP and user agent recorded on sessions and audit
//! entries, and used as the rate-limiter key.
//!
//! Forwarding headers are written by whoever sends the request, so they are
//! only read when the server is configured to sit behind a trusted proxy.
//! The router publishes that choice as a [`ClientIpSource`] request extension.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{Extensions, HeaderMap, header, request::Parts},
};

/// Header set by reverse proxies with the original client chain
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
/// Header set by some proxies with the original client address
pub const REAL_IP_HEADER: &str = "x-real-ip";

const UNKNOWN_IP: &str = "unknown";

/// Where the client IP comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientIpSource {
    /// Socket peer address only
    #[default]
    Peer,
    /// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer
    ProxyHeaders,
}

impl ClientIpSource {
    pub fn from_trust_proxy_headers(trust: bool) -> Self {
        if trust {
            ClientIpSource::ProxyHeaders
        } else {
            ClientIpSource::Peer
        }
    }
}

/// Origin of a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Resolve using the [`ClientIpSource`] extension, defaulting to the peer
    pub fn resolve(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let source = extensions
            .get::<ClientIpSource>()
            .copied()
            .unwrap_or_default();
        Self::resolve_with(headers, extensions, source)
    }

    /// Resolve with an explicit IP source. Falls back to `"unknown"` when no
    /// address is available.
    pub fn resolve_with(
        headers: &HeaderMap,
        extensions: &Extensions,
        source: ClientIpSource,
    ) -> Self {
        let header_str = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let forwarded = match source {
            ClientIpSource::ProxyHeaders => header_str(FORWARDED_FOR_HEADER)
                .and_then(|chain| chain.split(',').next())
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
                .or_else(|| header_str(REAL_IP_HEADER)),
            ClientIpSource::Peer => None,
        };

        let ip = forwarded
            .map(str::to_string)
            .or_else(|| {
                extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| UNKNOWN_IP.to_string());

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self { ip, user_agent }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::resolve(&parts.headers, &parts.extensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    fn peer(addr: &str) -> Extensions {
        let mut extensions = Extensions::new();
        let addr: SocketAddr = addr.parse().unwrap();
        extensions.insert(ConnectInfo(addr));
        extensions
    }

    #[test]
    fn test_forwarded_for_takes_first_hop_when_trusted() {
        let headers = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.1"),
            ("user-agent", "curl/8.0"),
        ]);

        let info = ClientInfo::resolve_with(
            &headers,
            &peer("192.0.2.10:5555"),
            ClientIpSource::ProxyHeaders,
        );
        assert_eq!(info.ip, "203.0.113.7");
        assert_eq!(info.user_agent, "curl/8.0");
    }

    #[test]
    fn test_real_ip_fallback_when_trusted() {
        let headers = headers(&[("x-real-ip", "198.51.100.1")]);
        let info = ClientInfo::resolve_with(
            &headers,
            &Extensions::new(),
            ClientIpSource::ProxyHeaders,
        );
        assert_eq!(info.ip, "198.51.100.1");
        assert_eq!(info.user_agent, "");
    }

    #[test]
    fn test_forwarding_headers_ignored_by_default() {
        let headers = headers(&[
            ("x-forwarded-for", "203.0.113.7"),
            ("x-real-ip", "198.51.100.1"),
        ]);

        let info = ClientInfo::resolve(&headers, &peer("192.0.2.10:5555"));
        assert_eq!(info.ip, "192.0.2.10");

        let info = ClientInfo::resolve_with(&headers, &Extensions::new(), ClientIpSource::Peer);
        assert_eq!(info.ip, "unknown");
    }

    #[test]
    fn test_source_read_from_extensions() {
        let headers = headers(&[("x-forwarded-for", "203.0.113.7")]);
        let mut extensions = peer("192.0.2.10:5555");
        extensions.insert(ClientIpSource::ProxyHeaders);

        let info = ClientInfo::resolve(&headers, &extensions);
        assert_eq!(info.ip, "203.0.113.7");
    }

    #[test]
    fn test_connect_info_fallback() {
        let info = ClientInfo::resolve(&HeaderMap::new(), &peer("192.0.2.10:5555"));
        assert_eq!(info.ip, "192.0.2.10");
    }

    #[test]
    fn test_unknown_when_nothing_available() {
        let headers = headers(&[("x-forwarded-for", "  ")]);
        let info = ClientInfo::resolve_with(
            &headers,
            &Extensions::new(),
            ClientIpSource::ProxyHeaders,
        );
        assert_eq!(info.ip, "unknown");
    }

    #[test]
    fn test_source_from_trust_flag() {
        assert_eq!(ClientIpSource::from_trust_proxy_headers(false), ClientIpSource::Peer);
        assert_eq!(
            ClientIpSource::from_trust_proxy_headers(true),
            ClientIpSource::ProxyHeaders
        );
        assert_eq!(ClientIpSource::default(), ClientIpSource::Peer);
    }
}
