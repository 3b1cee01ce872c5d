use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::entity::platform::Platform;

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request rates per platform (requests per second).
pub mod rate_limits {
    /// YouTube: quota is per day, not per second; stay gentle.
    pub const YOUTUBE_DEFAULT_RPS: u32 = 5;
    /// Feeds are usually small sites.
    pub const RSS_DEFAULT_RPS: u32 = 2;
    /// GitHub: 5000 requests/hour authenticated, bursts are fine.
    pub const GITHUB_DEFAULT_RPS: u32 = 10;
    /// Reddit: roughly 60 requests/minute for unauthenticated clients.
    pub const REDDIT_DEFAULT_RPS: u32 = 1;
}

/// Get the default rate limit for a platform.
pub fn default_rps_for_platform(platform: Platform) -> u32 {
    match platform {
        Platform::YouTube => rate_limits::YOUTUBE_DEFAULT_RPS,
        Platform::Rss => rate_limits::RSS_DEFAULT_RPS,
        Platform::GitHub => rate_limits::GITHUB_DEFAULT_RPS,
        Platform::Reddit => rate_limits::REDDIT_DEFAULT_RPS,
    }
}

/// How adapter requests are throttled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RateLimit {
    /// Use [`default_rps_for_platform`].
    #[default]
    PlatformDefault,
    /// Same rate for every platform.
    PerSecond(u32),
    /// No client-side throttling.
    Disabled,
}

impl RateLimit {
    /// Build the limiter for one platform, if any.
    pub fn limiter_for(&self, platform: Platform) -> Option<ApiRateLimiter> {
        match self {
            RateLimit::PlatformDefault => {
                Some(ApiRateLimiter::new(default_rps_for_platform(platform)))
            }
            RateLimit::PerSecond(rps) => Some(ApiRateLimiter::new(*rps)),
            RateLimit::Disabled => None,
        }
    }
}

/// A shareable API rate limiter using the governor crate.
///
/// # Example
///
/// ```ignore
/// let limiter = ApiRateLimiter::new(10); // 10 requests per second
///
/// // Before each API call:
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter; zero is treated as one request per second.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rps_for_platform() {
        assert_eq!(
            default_rps_for_platform(Platform::GitHub),
            rate_limits::GITHUB_DEFAULT_RPS
        );
        assert_eq!(
            default_rps_for_platform(Platform::Reddit),
            rate_limits::REDDIT_DEFAULT_RPS
        );
    }

    #[test]
    fn test_disabled_rate_limit_builds_no_limiter() {
        assert!(RateLimit::Disabled.limiter_for(Platform::Rss).is_none());
        assert!(RateLimit::PerSecond(3).limiter_for(Platform::Rss).is_some());
        assert!(RateLimit::default().limiter_for(Platform::YouTube).is_some());
    }

    #[tokio::test]
    async fn test_limiter_allows_first_request_immediately() {
        let limiter = ApiRateLimiter::new(0);
        tokio::time::timeout(std::time::Duration::from_secs(1), limiter.wait())
            .await
            .expect("first request should not wait");
    }
}
