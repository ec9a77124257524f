//! Client IP resolution for request logs.
//!
//! # Resolution Order
//!
//! 1. First entry of `X-Forwarded-For`
//! 2. `X-Real-IP`
//! 3. Socket peer address (`ConnectInfo<SocketAddr>`, present when the server
//!    is started with `into_make_service_with_connect_info`)
//! 4. [`UNKNOWN_IP`]
//!
//! The forwarding headers are client-controlled unless a reverse proxy in
//! front of the BFF overwrites them. The value is only ever logged, never used
//! for access decisions.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Fallback value when no client IP can be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Where the client address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientAddr<'a> {
    Header(&'a str),
    Peer(SocketAddr),
    Unknown,
}

#[inline]
fn resolve<B>(req: &Request<B>) -> ClientAddr<'_> {
    // Format: "client, proxy1, proxy2" - we want the first (client) IP
    if let Some(first) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return ClientAddr::Header(first);
    }

    if let Some(real_ip) = req
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return ClientAddr::Header(real_ip);
    }

    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => ClientAddr::Peer(*addr),
        None => ClientAddr::Unknown,
    }
}

/// Extract the client IP of a request.
///
/// Returns `Cow::Borrowed` for the [`UNKNOWN_IP`] fallback so the common
/// headerless test path does not allocate.
#[inline]
pub fn extract_client_ip<B>(req: &Request<B>) -> Cow<'static, str> {
    match resolve(req) {
        ClientAddr::Header(ip) => Cow::Owned(ip.to_string()),
        ClientAddr::Peer(addr) => Cow::Owned(addr.ip().to_string()),
        ClientAddr::Unknown => Cow::Borrowed(UNKNOWN_IP),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_extract_ip_from_xff() {
        let req = Request::builder()
            .header("x-forwarded-for", "192.168.1.1, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&req), "192.168.1.1");
    }

    #[test]
    fn test_extract_ip_from_real_ip() {
        let req = Request::builder()
            .header("x-real-ip", " 192.168.1.7 ")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&req), "192.168.1.7");
    }

    #[test]
    fn test_xff_priority_over_real_ip() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1")
            .header("x-real-ip", "192.168.1.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&req), "10.0.0.1");
    }

    #[test]
    fn test_empty_xff_falls_through() {
        let req = Request::builder()
            .header("x-forwarded-for", "  ")
            .header("x-real-ip", "192.168.1.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(extract_client_ip(&req), "192.168.1.1");
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        let addr: SocketAddr = "203.0.113.9:51234".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));

        assert_eq!(extract_client_ip(&req), "203.0.113.9");
    }

    #[test]
    fn test_unknown_is_borrowed() {
        let req = Request::builder().body(Body::empty()).unwrap();

        let ip = extract_client_ip(&req);
        assert_eq!(ip, UNKNOWN_IP);
        assert!(matches!(ip, Cow::Borrowed(_)));
    }
}
