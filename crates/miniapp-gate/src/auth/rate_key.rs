//! Throttling key derivation.
//!
//! Runs before and independently of verification, so the user id it recovers
//! is unverified. That is fine for bucketing requests; it must never be used
//! for authorization.

use crate::auth::identity::extract_identity;
use crate::auth::init_data::InitData;
use crate::auth::locator::{locate_init_data, RequestSources};
use std::fmt;
use std::net::IpAddr;

/// Bucket a request is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitKey {
    User(i64),
    Address(IpAddr),
    Anonymous,
}

impl RateLimitKey {
    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RateLimitKey::User(_) => "user",
            RateLimitKey::Address(_) => "address",
            RateLimitKey::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitKey::User(id) => write!(f, "user:{}", id),
            RateLimitKey::Address(addr) => write!(f, "ip:{}", addr),
            RateLimitKey::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// Best-effort throttling key: user id, then peer address, then the shared
/// anonymous bucket. Never fails.
pub fn derive_rate_limit_key(sources: &RequestSources, peer: Option<IpAddr>) -> RateLimitKey {
    let user_id = locate_init_data(sources)
        .and_then(|token| InitData::parse_unverified(token.value()).ok())
        .and_then(|data| extract_identity(&data).id.telegram_id());

    match (user_id, peer) {
        (Some(id), _) => RateLimitKey::User(id),
        (None, Some(addr)) => RateLimitKey::Address(addr),
        (None, None) => RateLimitKey::Anonymous,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use serde_json::json;
    use std::net::Ipv4Addr;

    const PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));

    fn with_header(value: &str) -> RequestSources {
        let mut headers = HeaderMap::new();
        headers.insert("x-telegram-initdata", HeaderValue::from_str(value).unwrap());
        RequestSources::new(headers, None, vec![])
    }

    #[test]
    fn test_user_json_id_is_used_without_verification() {
        let sources = with_header("user=%7B%22id%22%3A12345%7D&hash=not-a-real-hash");
        assert_eq!(
            derive_rate_limit_key(&sources, Some(PEER)),
            RateLimitKey::User(12345)
        );
    }

    #[test]
    fn test_bare_user_id_is_used() {
        let sources = RequestSources::new(
            HeaderMap::new(),
            Some(json!({"initData": "user_id=77"})),
            vec![],
        );
        assert_eq!(
            derive_rate_limit_key(&sources, None),
            RateLimitKey::User(77)
        );
    }

    #[test]
    fn test_unparseable_token_falls_back_to_peer() {
        let sources = with_header("garbage");
        assert_eq!(
            derive_rate_limit_key(&sources, Some(PEER)),
            RateLimitKey::Address(PEER)
        );
    }

    #[test]
    fn test_no_token_falls_back_to_peer() {
        assert_eq!(
            derive_rate_limit_key(&RequestSources::default(), Some(PEER)),
            RateLimitKey::Address(PEER)
        );
    }

    #[test]
    fn test_nothing_known_is_anonymous() {
        assert_eq!(
            derive_rate_limit_key(&with_header("auth_date=1"), None),
            RateLimitKey::Anonymous
        );
    }

    #[test]
    fn test_display_and_kind() {
        assert_eq!(RateLimitKey::User(5).to_string(), "user:5");
        assert_eq!(RateLimitKey::Address(PEER).to_string(), "ip:203.0.113.7");
        assert_eq!(RateLimitKey::Anonymous.to_string(), "anonymous");
        assert_eq!(RateLimitKey::Address(PEER).kind(), "address");
    }
}
