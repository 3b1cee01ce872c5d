//! Platform to adapter lookup.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::entity::platform::Platform;
use crate::http::HttpError;
use crate::retry::RetryConfig;

use super::SourceAdapter;
use super::client::DEFAULT_USER_AGENT;
use super::errors::{RegistryError, ResolveError};
use super::rate_limit::RateLimit;
use super::types::ResolvedSource;

/// Maps each platform to exactly one adapter.
///
/// URL resolution asks adapters in registration order, so catch-all adapters
/// (feeds) should be registered last.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous adapter for its platform.
    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Register an adapter, replacing any previous adapter for its platform.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let platform = adapter.platform();
        if let Some(slot) = self.adapters.iter_mut().find(|a| a.platform() == platform) {
            tracing::debug!(%platform, "Replacing registered adapter");
            *slot = adapter;
        } else {
            self.adapters.push(adapter);
        }
    }

    /// Adapter for `platform`; a miss is a configuration error.
    pub fn get(&self, platform: Platform) -> Result<Arc<dyn SourceAdapter>, RegistryError> {
        self.adapters
            .iter()
            .find(|a| a.platform() == platform)
            .cloned()
            .ok_or(RegistryError::UnknownPlatform(platform))
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.adapters.iter().map(|a| a.platform()).collect()
    }

    /// Resolve a URL to a source description.
    pub fn resolve(&self, input: &str) -> Result<ResolvedSource, ResolveError> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|e| ResolveError::InvalidUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ResolveError::InvalidUrl {
                url: trimmed.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ResolveError::InvalidUrl {
                url: trimmed.to_string(),
                reason: "missing host".to_string(),
            });
        }

        for adapter in &self.adapters {
            if let Some(resolved) = adapter.resolve(&url)? {
                return Ok(resolved);
            }
        }

        Err(ResolveError::Unrecognized {
            url: trimmed.to_string(),
        })
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}

/// Settings for [`default_registry`].
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub youtube_api_key: Option<String>,
    pub github_token: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
    pub rate_limit: RateLimit,
    pub retry: RetryConfig,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            github_token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            rate_limit: RateLimit::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Build a registry with every compiled-in adapter over a shared reqwest
/// transport.
pub fn default_registry(settings: &AdapterSettings) -> Result<AdapterRegistry, HttpError> {
    #[allow(unused_mut)]
    let mut registry = AdapterRegistry::new();

    #[cfg(any(
        feature = "youtube",
        feature = "rss",
        feature = "github",
        feature = "reddit"
    ))]
    {
        use super::client::HttpFetcher;
        use crate::http::HttpTransport;
        use crate::http::reqwest_transport::ReqwestTransport;

        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::with_timeout(settings.timeout)?);
        #[allow(unused_variables)]
        let fetcher_for = |platform: Platform| {
            HttpFetcher::new(Arc::clone(&transport))
                .with_user_agent(settings.user_agent.clone())
                .with_retry(settings.retry.clone())
                .with_rate_limiter(settings.rate_limit.limiter_for(platform))
        };

        #[cfg(feature = "youtube")]
        registry.register(Arc::new(super::youtube::YouTubeAdapter::new(
            fetcher_for(Platform::YouTube),
            settings.youtube_api_key.clone(),
        )));
        #[cfg(feature = "github")]
        registry.register(Arc::new(super::github::GitHubAdapter::new(
            fetcher_for(Platform::GitHub),
            settings.github_token.clone(),
        )));
        #[cfg(feature = "reddit")]
        registry.register(Arc::new(super::reddit::RedditAdapter::new(fetcher_for(
            Platform::Reddit,
        ))));
        // Feeds accept any http(s) URL, so they resolve last.
        #[cfg(feature = "rss")]
        registry.register(Arc::new(super::feed::FeedAdapter::new(fetcher_for(
            Platform::Rss,
        ))));
    }

    #[cfg(not(any(
        feature = "youtube",
        feature = "rss",
        feature = "github",
        feature = "reddit"
    )))]
    let _ = settings;

    tracing::debug!(platforms = ?registry.platforms(), "Built adapter registry");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::adapter::errors::{FetchError, NormalizationError};
    use crate::adapter::types::{Page, PageRequest};
    use crate::entity::source::Model as SourceModel;
    use crate::entity::source_type::SourceType;
    use crate::model::{CanonicalItem, FieldProjection, RawPayload};

    /// Claims URLs whose host ends with `suffix`.
    struct HostAdapter {
        platform: Platform,
        suffix: &'static str,
    }

    #[async_trait]
    impl SourceAdapter for HostAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn resolve(&self, url: &Url) -> Result<Option<ResolvedSource>, ResolveError> {
            let host = url.host_str().unwrap_or_default();
            if !host.ends_with(self.suffix) {
                return Ok(None);
            }
            if url.path() == "/" {
                return Err(ResolveError::unsupported(self.platform, url, "no path"));
            }
            Ok(Some(ResolvedSource::new(
                self.platform,
                self.platform.source_types()[0],
                url.path().trim_start_matches('/'),
                url.as_str(),
            )))
        }

        async fn fetch_page(
            &self,
            _source: &SourceModel,
            _request: PageRequest,
        ) -> Result<Page, FetchError> {
            Ok(Page::default())
        }

        fn normalize(
            &self,
            _payload: &RawPayload,
            _fields: &FieldProjection,
        ) -> Result<CanonicalItem, NormalizationError> {
            Err(NormalizationError::new("unused"))
        }
    }

    fn registry() -> AdapterRegistry {
        AdapterRegistry::new()
            .with(Arc::new(HostAdapter {
                platform: Platform::GitHub,
                suffix: "github.com",
            }))
            .with(Arc::new(HostAdapter {
                platform: Platform::Rss,
                suffix: "",
            }))
    }

    #[test]
    fn get_returns_configuration_error_on_miss() {
        let registry = registry();
        assert_eq!(registry.get(Platform::GitHub).unwrap().platform(), Platform::GitHub);
        assert_eq!(
            registry.get(Platform::Reddit).err(),
            Some(RegistryError::UnknownPlatform(Platform::Reddit))
        );
    }

    #[test]
    fn register_replaces_existing_platform() {
        let mut registry = registry();
        registry.register(Arc::new(HostAdapter {
            platform: Platform::GitHub,
            suffix: "ghe.example.com",
        }));
        assert_eq!(registry.platforms(), vec![Platform::GitHub, Platform::Rss]);
    }

    #[test]
    fn resolve_uses_registration_order() {
        let registry = registry();
        let resolved = registry.resolve("https://github.com/rust-lang/rust").unwrap();
        assert_eq!(resolved.platform, Platform::GitHub);
        assert_eq!(resolved.source_type, SourceType::Repo);

        let resolved = registry.resolve("https://blog.example.com/feed.xml").unwrap();
        assert_eq!(resolved.platform, Platform::Rss);
    }

    #[test]
    fn resolve_rejects_bad_urls() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("not a url"),
            Err(ResolveError::InvalidUrl { .. })
        ));
        assert!(matches!(
            registry.resolve("ftp://example.com/file"),
            Err(ResolveError::InvalidUrl { .. })
        ));
        assert!(matches!(
            registry.resolve("https://github.com/"),
            Err(ResolveError::Unsupported { platform: Platform::GitHub, .. })
        ));
        assert!(matches!(
            AdapterRegistry::new().resolve("https://example.com/x"),
            Err(ResolveError::Unrecognized { .. })
        ));
    }

    #[test]
    fn default_registry_registers_compiled_adapters_with_feeds_last() {
        let registry = default_registry(&AdapterSettings::default()).expect("registry");
        let platforms = registry.platforms();
        #[cfg(feature = "rss")]
        assert_eq!(platforms.last(), Some(&Platform::Rss));
        #[cfg(all(feature = "youtube", feature = "github", feature = "reddit", feature = "rss"))]
        assert_eq!(platforms.len(), 4);
        let _ = platforms;
    }
}
