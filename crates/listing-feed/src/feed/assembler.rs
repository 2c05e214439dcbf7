use tracing::{debug, warn};

use super::availability::is_included;
use super::domain::{FeedConfig, PropertyRecord};
use super::serializer::{serialize_record, RecordDiagnostic};

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Fully rendered feed produced by one assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub xml: String,
    /// Codes of the published listings, in catalog order.
    pub listing_ids: Vec<i64>,
    /// Listings left out by the availability flags.
    pub filtered_out: usize,
    pub diagnostics: Vec<RecordDiagnostic>,
}

impl FeedDocument {
    pub fn listing_count(&self) -> usize {
        self.listing_ids.len()
    }
}

/// Filters and serializes the snapshot into the complete feed text.
///
/// Records keep their catalog order and are not deduplicated. The output
/// depends only on the inputs, so repeated runs yield identical bytes.
pub fn assemble_feed(
    records: &[PropertyRecord],
    config: &FeedConfig,
    fallback_state: &str,
) -> FeedDocument {
    let mut xml = String::with_capacity(256 + records.len() * 1024);
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str("<imoveis>\n");

    let mut listing_ids = Vec::with_capacity(records.len());
    let mut filtered_out = 0;
    let mut diagnostics = Vec::new();

    for record in records {
        if !is_included(&record.status, config) {
            debug!(record_id = record.id, status = ?record.status, "listing filtered out of feed");
            filtered_out += 1;
            continue;
        }

        match serialize_record(record, fallback_state, &mut xml) {
            Ok(()) => listing_ids.push(record.id),
            Err(diagnostic) => {
                warn!(
                    record_id = diagnostic.record_id,
                    field = diagnostic.field.label(),
                    problem = diagnostic.problem.label(),
                    "skipping malformed listing"
                );
                diagnostics.push(diagnostic);
            }
        }
    }

    xml.push_str("</imoveis>\n");

    FeedDocument {
        xml,
        listing_ids,
        filtered_out,
        diagnostics,
    }
}
