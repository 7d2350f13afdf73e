//! Domain Value Objects

use std::fmt;
use std::net::IpAddr;

use platform::client::AuthenticatedUser;

/// Sentinel used when the caller's IP cannot be determined
pub const UNKNOWN_IP: &str = "unknown";

/// Stable identity a request is counted against
///
/// `user_<uid>_<ip>` for authenticated callers, `ip_<ip>` otherwise.
/// Unidentifiable callers share the `ip_unknown` bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn resolve(ip: Option<IpAddr>, user: Option<&AuthenticatedUser>) -> Self {
        let ip = ip
            .map(|ip| ip.to_canonical().to_string())
            .unwrap_or_else(|| UNKNOWN_IP.to_string());

        match user {
            Some(user) => Self(format!("user_{}_{}", user.uid, ip)),
            None => Self(format!("ip_{ip}")),
        }
    }

    /// Wrap an already-derived key (e.g. read back from storage)
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RateLimitKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_key() {
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        assert_eq!(RateLimitKey::resolve(Some(ip), None).as_str(), "ip_203.0.113.5");
    }

    #[test]
    fn test_authenticated_key_keeps_ip_partition() {
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        let user = AuthenticatedUser::new("uid42");
        assert_eq!(
            RateLimitKey::resolve(Some(ip), Some(&user)).as_str(),
            "user_uid42_203.0.113.5"
        );
    }

    #[test]
    fn test_missing_ip_uses_sentinel() {
        assert_eq!(RateLimitKey::resolve(None, None).as_str(), "ip_unknown");

        let user = AuthenticatedUser::new("uid42");
        assert_eq!(
            RateLimitKey::resolve(None, Some(&user)).as_str(),
            "user_uid42_unknown"
        );
    }

    #[test]
    fn test_mapped_ipv4_is_canonicalized() {
        let mapped: IpAddr = "::ffff:192.0.2.1".parse().unwrap();
        assert_eq!(RateLimitKey::resolve(Some(mapped), None).as_str(), "ip_192.0.2.1");
    }
}
