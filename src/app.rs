//! Application lifecycle
//!
//! Wires settings into the refresh service, cache and scheduler, and provides
//! the activation (cache pre-warm), serving and deactivation steps.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::cache::{CacheManager, CacheStore, MemorySlot, PersistentSlot};
use crate::config::Settings;
use crate::fetch::{AdsTxtClient, AdsTxtSource, FetchError};
use crate::refresh::{AdsTxtService, DAILY_REFRESH_JOB};
use crate::schedule::Scheduler;
use crate::server::{AdsTxtResponder, Server, ServerError};

/// Errors that stop the application
#[derive(Debug, Error)]
pub enum AppError {
    /// HTTP client could not be built
    #[error("Could not create HTTP client: {0}")]
    Client(#[from] FetchError),

    /// Server loop failed
    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// A configured relay instance
pub struct App {
    settings: Settings,
    service: Arc<AdsTxtService>,
    scheduler: Arc<Scheduler>,
}

impl App {
    /// Builds the relay with the real upstream client and cache
    pub fn new(settings: Settings) -> Result<Self, AppError> {
        let client = AdsTxtClient::with_endpoint(settings.endpoint.clone(), settings.fetch_timeout)?;
        let cache = open_cache(settings.cache_dir.as_deref());
        Ok(Self::with_parts(settings, Arc::new(client), cache))
    }

    /// Builds the relay around the given upstream and cache
    pub fn with_parts(settings: Settings, source: Arc<dyn AdsTxtSource>, cache: Arc<dyn CacheStore>) -> Self {
        let service = AdsTxtService::new(source, cache)
            .with_extra_params(settings.extra_params.clone())
            .with_site_url(settings.site_url.clone())
            .with_server_name(settings.server_name.clone());

        Self {
            settings,
            service: Arc::new(service),
            scheduler: Arc::new(Scheduler::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn service(&self) -> &Arc<AdsTxtService> {
        &self.service
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// One-time forced refresh that pre-warms the cache
    pub async fn activate(&self) -> Option<String> {
        tracing::info!("activating: pre-warming ads.txt cache");
        self.service.refresh().await
    }

    /// Removes the scheduled refresh
    pub fn deactivate(&self) {
        if self.scheduler.unschedule(DAILY_REFRESH_JOB) {
            tracing::info!("deactivated: daily refresh removed");
        }
    }

    /// Activates, serves on `listener` until `shutdown` completes, then deactivates
    pub async fn serve<S>(&self, listener: TcpListener, shutdown: S) -> Result<(), AppError>
    where
        S: Future<Output = ()>,
    {
        self.activate().await;

        let responder = AdsTxtResponder::new(self.service.clone()).with_escape_html(self.settings.escape_html);
        let server = Arc::new(
            Server::new(responder, self.scheduler.clone()).with_refresh_interval(self.settings.refresh_interval),
        );

        let result = server.run(listener, shutdown).await;
        self.deactivate();
        self.scheduler.shutdown();
        result.map_err(AppError::from)
    }
}

/// Opens the on-disk cache, falling back to memory when no directory is known
fn open_cache(dir: Option<&Path>) -> Arc<dyn CacheStore> {
    let manager = match dir {
        Some(dir) => Some(CacheManager::with_dir(dir.to_path_buf())),
        None => CacheManager::new(),
    };

    match manager {
        Some(manager) => {
            tracing::debug!(dir = %manager.dir().display(), "using disk cache");
            Arc::new(PersistentSlot::new(manager))
        }
        None => {
            tracing::warn!("no cache directory available; caching ads.txt in memory");
            Arc::new(MemorySlot::new())
        }
    }
}
