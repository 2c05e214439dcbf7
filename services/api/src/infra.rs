use listing_feed::config::FeedSettings;
use listing_feed::error::AppError;
use listing_feed::feed::{FeedExporter, FeedTrigger, FileSystemSink, InMemoryCatalog};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) type ServiceTrigger = FeedTrigger<InMemoryCatalog, FileSystemSink>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Shared by the feed and catalog routes.
#[derive(Clone)]
pub(crate) struct FeedState {
    pub(crate) catalog: Arc<InMemoryCatalog>,
    pub(crate) trigger: Arc<ServiceTrigger>,
}

impl FeedState {
    pub(crate) fn new(catalog: Arc<InMemoryCatalog>, settings: &FeedSettings) -> Self {
        let exporter = FeedExporter::new(
            Arc::clone(&catalog),
            Arc::new(FileSystemSink),
            settings.publish_target(),
            settings.fallback_state.clone(),
        );
        Self {
            catalog,
            trigger: Arc::new(FeedTrigger::new(exporter)),
        }
    }
}

/// Seeds the catalog from `FEED_CATALOG_PATH` when configured; starts empty
/// otherwise, which leaves generation disabled until a config is stored.
pub(crate) fn load_catalog(settings: &FeedSettings) -> Result<InMemoryCatalog, AppError> {
    match &settings.catalog_path {
        Some(path) => {
            let catalog = InMemoryCatalog::from_path(path)?;
            info!(path = %path.display(), "catalog seeded from export");
            Ok(catalog)
        }
        None => {
            warn!("FEED_CATALOG_PATH not set, starting with an empty catalog");
            Ok(InMemoryCatalog::default())
        }
    }
}
