use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::assembler::assemble_feed;
use super::catalog::{CatalogError, CatalogSource};
use super::publisher::{FeedPublisher, FeedSink, PublishError, PublishTarget, PublishedFeed};
use super::serializer::RecordDiagnostic;

/// Outcome of one filter, serialize, assemble and publish pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassReport {
    /// No feed configuration exists; the feature is switched off.
    Disabled,
    Published {
        feed: PublishedFeed,
        listings: usize,
        filtered_out: usize,
        skipped: Vec<RecordDiagnostic>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Runs complete passes against a catalog and a feed sink.
#[derive(Debug)]
pub struct FeedExporter<C, S> {
    catalog: Arc<C>,
    publisher: FeedPublisher<S>,
    fallback_state: String,
}

impl<C, S> FeedExporter<C, S>
where
    C: CatalogSource,
    S: FeedSink,
{
    pub fn new(
        catalog: Arc<C>,
        sink: Arc<S>,
        target: PublishTarget,
        fallback_state: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            publisher: FeedPublisher::new(sink, target),
            fallback_state: fallback_state.into(),
        }
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    /// Reads one snapshot and publishes the feed built from it.
    ///
    /// Record problems are reported in the result and never abort the pass;
    /// only catalog and publish failures are errors. The document is fully
    /// assembled before anything is written.
    pub fn run_pass(&self) -> Result<PassReport, ExportError> {
        let snapshot = self.catalog.snapshot()?;
        let Some(config) = snapshot.feed_config else {
            info!("feed configuration absent, skipping generation");
            return Ok(PassReport::Disabled);
        };

        let document = assemble_feed(&snapshot.properties, &config, &self.fallback_state);
        let feed = self
            .publisher
            .publish(&document.xml, config.publish_path())?;

        if let Err(err) = self.catalog.record_publish(feed.last_update) {
            warn!(error = %err, url = %feed.url, "feed published but last update was not recorded");
        }

        info!(
            url = %feed.url,
            account = config.viva_real_username.as_deref().unwrap_or("-"),
            listings = document.listing_count(),
            filtered_out = document.filtered_out,
            skipped = document.diagnostics.len(),
            "feed generation pass complete"
        );

        Ok(PassReport::Published {
            listings: document.listing_count(),
            filtered_out: document.filtered_out,
            skipped: document.diagnostics,
            feed,
        })
    }
}
