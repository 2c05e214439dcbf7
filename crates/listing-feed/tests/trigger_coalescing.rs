use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use listing_feed::feed::{
    CatalogError, CatalogSnapshot, CatalogSource, FeedConfig, FeedExporter, FeedTrigger,
    FileSystemSink, GenerationPhase, InMemoryCatalog, LooseNumber, PassOutcome, PassReport,
    PropertyRecord, PropertyStatus, PublishTarget, TriggerAdmission, TriggerKind, TriggerResult,
};

/// Catalog whose snapshot blocks until the test releases it.
#[derive(Debug)]
struct GatedCatalog {
    inner: InMemoryCatalog,
    snapshots: AtomicUsize,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GatedCatalog {
    fn new(snapshot: CatalogSnapshot) -> (Arc<Self>, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let catalog = Arc::new(Self {
            inner: InMemoryCatalog::new(snapshot),
            snapshots: AtomicUsize::new(0),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        (catalog, entered_rx, release_tx)
    }
}

impl CatalogSource for GatedCatalog {
    fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        self.entered
            .lock()
            .expect("entered lock")
            .send(())
            .map_err(|_| CatalogError::Unavailable("test finished".to_string()))?;
        self.release
            .lock()
            .expect("release lock")
            .recv()
            .map_err(|_| CatalogError::Unavailable("gate dropped".to_string()))?;
        self.inner.snapshot()
    }

    fn feed_config(&self) -> Result<Option<FeedConfig>, CatalogError> {
        self.inner.feed_config()
    }

    fn record_publish(&self, last_update: DateTime<Utc>) -> Result<(), CatalogError> {
        self.inner.record_publish(last_update)
    }
}

/// Catalog whose first snapshot panics.
#[derive(Debug)]
struct PanickingCatalog {
    inner: InMemoryCatalog,
    armed: AtomicBool,
}

impl CatalogSource for PanickingCatalog {
    fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            panic!("catalog driver crashed");
        }
        self.inner.snapshot()
    }

    fn feed_config(&self) -> Result<Option<FeedConfig>, CatalogError> {
        self.inner.feed_config()
    }

    fn record_publish(&self, last_update: DateTime<Utc>) -> Result<(), CatalogError> {
        self.inner.record_publish(last_update)
    }
}

fn listing(id: i64) -> PropertyRecord {
    PropertyRecord {
        id,
        property_type: "house".to_string(),
        status: PropertyStatus::Available,
        address: "Rua das Flores, 12".to_string(),
        city: "Curitiba-PR".to_string(),
        area: Some(LooseNumber::from(180_i64)),
        price: Some(LooseNumber::from(950_000_i64)),
        description: Some("Casa com quintal".into()),
        ..PropertyRecord::default()
    }
}

fn snapshot(automatic: bool) -> CatalogSnapshot {
    CatalogSnapshot {
        properties: vec![listing(1), listing(2)],
        feed_config: Some(FeedConfig {
            xml_automatic_update: automatic,
            ..FeedConfig::default()
        }),
    }
}

fn trigger<C: CatalogSource + 'static>(
    catalog: Arc<C>,
    root: &std::path::Path,
) -> Arc<FeedTrigger<C, FileSystemSink>> {
    let exporter = FeedExporter::new(
        catalog,
        Arc::new(FileSystemSink),
        PublishTarget::new(root, "https://feeds.example.com"),
        "SP",
    );
    Arc::new(FeedTrigger::new(exporter))
}

#[test]
fn burst_of_mutations_during_a_pass_costs_one_extra_pass() {
    let root = tempfile::tempdir().expect("temp dir");
    let (catalog, entered, release) = GatedCatalog::new(snapshot(true));
    let trigger = trigger(catalog.clone(), root.path());

    let running = Arc::clone(&trigger);
    let first = thread::spawn(move || running.trigger_blocking(TriggerKind::Manual));

    entered
        .recv_timeout(Duration::from_secs(5))
        .expect("first pass reads the catalog");
    assert_eq!(trigger.status().phase, GenerationPhase::Generating);

    for _ in 0..5 {
        assert!(matches!(
            trigger.trigger_blocking(TriggerKind::CatalogMutation),
            TriggerResult::Coalesced
        ));
    }
    assert!(trigger.status().rerun_pending);

    release.send(()).expect("release first pass");
    entered
        .recv_timeout(Duration::from_secs(5))
        .expect("coalesced rerun reads the catalog");
    release.send(()).expect("release rerun");

    let result = first.join().expect("trigger thread");
    assert!(matches!(
        result,
        TriggerResult::Completed(Ok(PassReport::Published { listings: 2, .. }))
    ));

    assert_eq!(catalog.snapshots.load(Ordering::SeqCst), 2);
    let status = trigger.status();
    assert_eq!(status.phase, GenerationPhase::Idle);
    assert!(!status.rerun_pending);
    assert_eq!(status.completed_passes, 2);
    assert!(matches!(
        status.last_outcome,
        Some(PassOutcome::Completed { .. })
    ));
}

#[test]
fn mutation_is_ignored_when_automatic_updates_are_off() {
    let root = tempfile::tempdir().expect("temp dir");
    let catalog = Arc::new(InMemoryCatalog::new(snapshot(false)));
    let trigger = trigger(catalog, root.path());

    assert!(matches!(
        trigger.trigger_blocking(TriggerKind::CatalogMutation),
        TriggerResult::Ignored
    ));
    assert!(!root.path().join("vivareal.xml").exists());
    assert_eq!(trigger.status().completed_passes, 0);

    assert!(matches!(
        trigger.trigger_blocking(TriggerKind::Manual),
        TriggerResult::Completed(Ok(PassReport::Published { .. }))
    ));
    assert!(root.path().join("vivareal.xml").is_file());
}

#[test]
fn mutation_without_feed_configuration_is_ignored() {
    let root = tempfile::tempdir().expect("temp dir");
    let catalog = Arc::new(InMemoryCatalog::new(CatalogSnapshot {
        properties: vec![listing(1)],
        feed_config: None,
    }));
    let trigger = trigger(catalog, root.path());

    assert!(matches!(
        trigger.trigger_blocking(TriggerKind::CatalogMutation),
        TriggerResult::Ignored
    ));
    assert!(matches!(
        trigger.trigger_blocking(TriggerKind::Manual),
        TriggerResult::Completed(Ok(PassReport::Disabled))
    ));
}

#[test]
fn panicking_pass_returns_controller_to_idle() {
    let root = tempfile::tempdir().expect("temp dir");
    let catalog = Arc::new(PanickingCatalog {
        inner: InMemoryCatalog::new(snapshot(true)),
        armed: AtomicBool::new(true),
    });
    let trigger = trigger(catalog, root.path());

    let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
        trigger.trigger_blocking(TriggerKind::Manual)
    }));
    assert!(unwound.is_err());

    let status = trigger.status();
    assert_eq!(status.phase, GenerationPhase::Idle);
    assert!(!status.rerun_pending);
    assert_eq!(status.completed_passes, 1);
    assert!(matches!(status.last_outcome, Some(PassOutcome::Failed { .. })));

    assert!(matches!(
        trigger.trigger_blocking(TriggerKind::CatalogMutation),
        TriggerResult::Completed(Ok(PassReport::Published { .. }))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_request_reports_on_status_channel() {
    let root = tempfile::tempdir().expect("temp dir");
    let catalog = Arc::new(InMemoryCatalog::new(snapshot(true)));
    let trigger = trigger(catalog.clone(), root.path());
    let mut status = trigger.subscribe();

    assert_eq!(
        trigger.request_manual_generation(),
        TriggerAdmission::Started
    );
    let settled = status
        .wait_for(|status| status.phase == GenerationPhase::Idle && status.completed_passes == 1)
        .await
        .expect("trigger alive")
        .clone();

    assert!(matches!(
        settled.last_outcome,
        Some(PassOutcome::Completed {
            report: PassReport::Published { .. }
        })
    ));
    assert!(catalog
        .feed_config()
        .expect("config")
        .and_then(|config| config.last_update)
        .is_some());
}
