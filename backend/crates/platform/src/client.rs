//! Client identification utilities
//!
//! Common functions for identifying callers via HTTP headers and
//! connection metadata.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, header};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Authenticated principal attached to request extensions
///
/// Inserted by the identity middleware once a bearer token verifies;
/// absent for anonymous callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub uid: String,
}

impl AuthenticatedUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// Reverse proxies whose `X-Forwarded-For` header is honoured
///
/// Attached to requests as an extension. A request without one, or whose
/// socket peer is not listed, is identified by its socket address alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies {
    peers: HashSet<IpAddr>,
}

impl TrustedProxies {
    /// Parse a comma-separated list
    ///
    /// Blank segments are skipped. Every malformed entry is returned.
    pub fn parse(raw: &str) -> Result<Self, Vec<String>> {
        let mut peers = HashSet::new();
        let mut invalid = Vec::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match parse_ip(entry) {
                Some(ip) => {
                    peers.insert(ip);
                }
                None => invalid.push(entry.to_string()),
            }
        }

        if invalid.is_empty() {
            Ok(Self { peers })
        } else {
            Err(invalid)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.peers.contains(&canonical_ip(ip))
    }
}

/// Canonical form of an address
///
/// IPv4-mapped IPv6 is unmapped and `::1` becomes `127.0.0.1`.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip.to_canonical() {
        IpAddr::V6(v6) if v6.is_loopback() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other,
    }
}

/// Parse a textual address, accepting `localhost`
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("localhost") {
        return Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    raw.parse::<IpAddr>().ok().map(canonical_ip)
}

/// Extract client IP address
///
/// The first X-Forwarded-For entry is used only when the direct peer is a
/// trusted proxy. Anyone else could claim an arbitrary address with it.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `direct_ip` - Direct connection IP address
/// * `trusted` - Proxies allowed to report the original client
///
/// ## Returns
/// The client IP address, or None if not determinable
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted: &TrustedProxies,
) -> Option<IpAddr> {
    let direct_ip = direct_ip.map(canonical_ip);

    if let Some(peer) = direct_ip.filter(|ip| trusted.contains(*ip)) {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|xff| xff.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());

        if let Some(ip) = forwarded {
            return Some(canonical_ip(ip));
        }
        tracing::debug!(peer = %peer, "Trusted proxy sent no usable X-Forwarded-For");
    }

    direct_ip
}

/// Resolve the client IP of a request
///
/// Combines the socket address recorded by
/// `into_make_service_with_connect_info::<SocketAddr>()` with the
/// [`TrustedProxies`] extension.
pub fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    let direct_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    match req.extensions().get::<TrustedProxies>() {
        Some(trusted) => extract_client_ip(req.headers(), direct_ip, trusted),
        None => extract_client_ip(req.headers(), direct_ip, &TrustedProxies::default()),
    }
}

/// User-Agent header value, for logging
pub fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
}
