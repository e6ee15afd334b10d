//! Fetch-or-cache decision logic
//!
//! `AdsTxtService` decides per call whether the cached document can be served
//! or a fresh one must be fetched. Failures never reach the caller: a failed
//! fetch falls back to whatever the cache held when the call started.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, ADS_TXT_CACHE_TTL};
use crate::compose::compose;
use crate::config::ExtraParams;
use crate::domain::{resolve_domain, RequestContext};
use crate::fetch::AdsTxtSource;
use crate::schedule::Scheduler;

/// Name of the recurring forced-refresh job
pub const DAILY_REFRESH_JOB: &str = "fetch-ads-txt";

/// Serves the ads.txt document from cache, refreshing it when needed
pub struct AdsTxtService {
    source: Arc<dyn AdsTxtSource>,
    cache: Arc<dyn CacheStore>,
    extra_params: ExtraParams,
    site_url: Option<String>,
    server_name: Option<String>,
}

impl AdsTxtService {
    pub fn new(source: Arc<dyn AdsTxtSource>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            source,
            cache,
            extra_params: ExtraParams::default(),
            site_url: None,
            server_name: None,
        }
    }

    pub fn with_extra_params(mut self, extra_params: ExtraParams) -> Self {
        self.extra_params = extra_params;
        self
    }

    pub fn with_site_url(mut self, site_url: Option<String>) -> Self {
        self.site_url = site_url;
        self
    }

    pub fn with_server_name(mut self, server_name: Option<String>) -> Self {
        self.server_name = server_name;
        self
    }

    /// Returns the composed document, fetching first if the cache is empty or `force` is set
    ///
    /// An empty cached body counts as empty and is fetched again.
    ///
    /// # Arguments
    /// * `force` - Fetch even if the cache is fresh
    /// * `host` - `Host` header of the request being served, if any
    ///
    /// # Behavior
    /// - A successful fetch (even of an empty body) overwrites the cache
    /// - A failed fetch keeps the value read from the cache, possibly none
    /// - Non-empty data gets the extra params appended; anything else is returned as-is
    pub async fn get_content_or_refresh(&self, force: bool, host: Option<&str>) -> Option<String> {
        let mut data = self.cache.get();

        if data.as_deref().map_or(true, str::is_empty) || force {
            let ctx = RequestContext::new(self.server_name.clone(), host.map(str::to_string));
            let domain = resolve_domain(self.site_url.as_deref(), &ctx);

            match self.source.fetch(domain.as_deref()).await {
                Ok(body) => {
                    if let Err(e) = self.cache.set(&body, ADS_TXT_CACHE_TTL) {
                        tracing::warn!(error = %e, "could not store ads.txt in cache");
                    }
                    tracing::info!(domain = ?domain, bytes = body.len(), force, "refreshed ads.txt");
                    data = Some(body);
                }
                Err(e) => {
                    tracing::warn!(domain = ?domain, error = %e, stale = data.is_some(), "ads.txt fetch failed");
                }
            }
        } else {
            tracing::debug!("serving ads.txt from cache");
        }

        let extra = self.extra_params.load();
        compose(data, extra.as_deref())
    }

    /// Forced refresh, as run by the scheduler and at activation
    pub async fn refresh(&self) -> Option<String> {
        self.get_content_or_refresh(true, None).await
    }

    /// Content for an inbound request, fetching only on a cache miss
    pub async fn current_content(&self, host: Option<&str>) -> Option<String> {
        self.get_content_or_refresh(false, host).await
    }
}

/// Schedules the recurring forced refresh unless it already is
///
/// Returns `true` if the job was newly registered.
pub fn register_daily_refresh(scheduler: &Scheduler, service: Arc<AdsTxtService>, interval: Duration) -> bool {
    scheduler.schedule_recurring(DAILY_REFRESH_JOB, interval, move || {
        let service = service.clone();
        async move {
            service.refresh().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemorySlot;
    use crate::fetch::FetchError;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fake upstream that counts calls and records requested domains
    struct FakeSource {
        body: Option<String>,
        calls: AtomicUsize,
        domains: Mutex<Vec<Option<String>>>,
    }

    impl FakeSource {
        fn returning(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: Some(body.to_string()),
                calls: AtomicUsize::new(0),
                domains: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                body: None,
                calls: AtomicUsize::new(0),
                domains: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AdsTxtSource for FakeSource {
        async fn fetch(&self, domain: Option<&str>) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.domains.lock().unwrap().push(domain.map(str::to_string));
            match &self.body {
                Some(body) => Ok(body.clone()),
                None => Err(unreachable_upstream().await),
            }
        }
    }

    /// A real transport error from a port nobody listens on
    async fn unreachable_upstream() -> FetchError {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        reqwest::Client::new()
            .get(format!("http://{}/", addr))
            .send()
            .await
            .expect_err("nothing listens on a dropped port")
            .into()
    }

    fn build_service(source: Arc<FakeSource>, cache: Arc<MemorySlot>) -> AdsTxtService {
        AdsTxtService::new(source, cache)
    }

    #[tokio::test]
    async fn test_empty_cache_fetches_and_composes() {
        let source = FakeSource::returning("google.com, pub-999, DIRECT");
        let cache = Arc::new(MemorySlot::new());
        let service = build_service(source.clone(), cache.clone()).with_extra_params(ExtraParams::Inline(Some(
            "google.com, pub-123, DIRECT".to_string(),
        )));

        let content = service.current_content(None).await;

        assert_eq!(
            content.as_deref(),
            Some("google.com, pub-999, DIRECT\ngoogle.com, pub-123, DIRECT")
        );
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.get().as_deref(), Some("google.com, pub-999, DIRECT"));
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_fetch() {
        let source = FakeSource::returning("B");
        let cache = Arc::new(MemorySlot::new());
        cache.set_at("A", ADS_TXT_CACHE_TTL, Utc::now() - ChronoDuration::hours(1));
        let service = build_service(source.clone(), cache);

        let content = service.current_content(Some("example.com")).await;

        assert_eq!(content.as_deref(), Some("A\n"));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_force_fetches_despite_fresh_cache() {
        let source = FakeSource::returning("B");
        let cache = Arc::new(MemorySlot::new());
        cache.set("A", ADS_TXT_CACHE_TTL).unwrap();
        let service = build_service(source.clone(), cache.clone());

        let content = service.refresh().await;

        assert_eq!(content.as_deref(), Some("B\n"));
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.get().as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_forced_fetch_failure_keeps_prior_cache() {
        let source = FakeSource::failing();
        let cache = Arc::new(MemorySlot::new());
        cache.set("A", ADS_TXT_CACHE_TTL).unwrap();
        let service = build_service(source.clone(), cache.clone());

        let content = service.refresh().await;

        assert_eq!(content.as_deref(), Some("A\n"));
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.get().as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_expired_cache_with_failed_fetch_serves_nothing() {
        let source = FakeSource::failing();
        let cache = Arc::new(MemorySlot::new());
        cache.set_at("A", ADS_TXT_CACHE_TTL, Utc::now() - ChronoDuration::hours(25));
        let service = build_service(source.clone(), cache)
            .with_extra_params(ExtraParams::Inline(Some("extra".to_string())));

        let content = service.current_content(None).await;

        assert_eq!(content, None);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_stored_and_passed_through() {
        let source = FakeSource::returning("");
        let cache = Arc::new(MemorySlot::new());
        let service = build_service(source.clone(), cache.clone())
            .with_extra_params(ExtraParams::Inline(Some("extra".to_string())));

        let content = service.current_content(None).await;

        assert_eq!(content, Some(String::new()));
        assert_eq!(cache.get(), Some(String::new()));
    }

    #[tokio::test]
    async fn test_empty_cached_body_is_refetched() {
        let source = FakeSource::returning("B");
        let cache = Arc::new(MemorySlot::new());
        cache.set("", ADS_TXT_CACHE_TTL).unwrap();
        let service = build_service(source.clone(), cache.clone());

        assert_eq!(service.current_content(None).await.as_deref(), Some("B\n"));
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.get().as_deref(), Some("B"));

        // Now non-empty, so the next request is a cache hit
        service.current_content(None).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_cached_body_with_failed_fetch_stays_empty() {
        let source = FakeSource::failing();
        let cache = Arc::new(MemorySlot::new());
        cache.set("", ADS_TXT_CACHE_TTL).unwrap();
        let service = build_service(source.clone(), cache)
            .with_extra_params(ExtraParams::Inline(Some("extra".to_string())));

        assert_eq!(service.current_content(None).await, Some(String::new()));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_domain_resolution_feeds_fetch() {
        let source = FakeSource::returning("A");
        let service = build_service(source.clone(), Arc::new(MemorySlot::new()))
            .with_site_url(Some("https://www.example.com/".to_string()))
            .with_server_name(Some("server.local".to_string()));

        service.refresh().await;

        assert_eq!(
            source.domains.lock().unwrap().as_slice(),
            &[Some("example.com".to_string())]
        );
    }

    #[tokio::test]
    async fn test_host_header_used_without_configured_names() {
        let source = FakeSource::returning("A");
        let service = build_service(source.clone(), Arc::new(MemorySlot::new()));

        service.current_content(Some("host.example")).await;
        service.refresh().await;

        assert_eq!(
            source.domains.lock().unwrap().as_slice(),
            &[Some("host.example".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_register_daily_refresh_is_idempotent() {
        let scheduler = Scheduler::new();
        let service = Arc::new(build_service(FakeSource::returning("A"), Arc::new(MemorySlot::new())));

        assert!(register_daily_refresh(&scheduler, service.clone(), Duration::from_secs(86_400)));
        assert!(!register_daily_refresh(&scheduler, service, Duration::from_secs(86_400)));
        assert!(scheduler.next_scheduled(DAILY_REFRESH_JOB).is_some());

        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_refresh_forces_fetch() {
        let source = FakeSource::returning("B");
        let cache = Arc::new(MemorySlot::new());
        cache.set("A", ADS_TXT_CACHE_TTL).unwrap();
        let scheduler = Scheduler::new();
        let service = Arc::new(build_service(source.clone(), cache.clone()));

        register_daily_refresh(&scheduler, service, Duration::from_secs(86_400));
        tokio::time::sleep(Duration::from_secs(86_400 + 1)).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(cache.get().as_deref(), Some("B"));

        scheduler.shutdown();
    }
}
