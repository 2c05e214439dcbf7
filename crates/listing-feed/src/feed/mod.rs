pub mod address;
pub mod assembler;
pub mod availability;
pub mod catalog;
pub mod classifier;
pub mod domain;
pub mod escape;
pub mod exporter;
pub mod publisher;
pub mod serializer;
pub mod trigger;

pub use assembler::{assemble_feed, FeedDocument};
pub use availability::{availability_label, is_included};
pub use catalog::{CatalogError, CatalogSnapshot, CatalogSource, InMemoryCatalog};
pub use domain::{
    FeedConfig, ImageRef, LooseNumber, LooseText, PropertyRecord, PropertyStatus, Purpose,
    DEFAULT_FEED_FILENAME,
};
pub use exporter::{ExportError, FeedExporter, PassReport};
pub use publisher::{
    FeedPublisher, FeedSink, FileSystemSink, PublishError, PublishTarget, PublishedFeed,
};
pub use serializer::{DiagnosticProblem, ListingEntry, RecordDiagnostic, RequiredField};
pub use trigger::{
    FeedStatus, FeedTrigger, GenerationPhase, PassOutcome, TriggerAdmission, TriggerKind,
    TriggerResult,
};
