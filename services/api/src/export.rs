use clap::Args;
use listing_feed::config::AppConfig;
use listing_feed::error::AppError;
use listing_feed::feed::{FeedExporter, FileSystemSink, InMemoryCatalog, PassReport};
use listing_feed::telemetry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// JSON catalog export: {"properties": [...], "feedConfig": {...}}
    #[arg(long)]
    pub(crate) catalog: PathBuf,
    /// Directory served as the public web root (overrides FEED_PUBLIC_ROOT)
    #[arg(long)]
    pub(crate) public_root: Option<PathBuf>,
    /// Public base URL of the web root (overrides FEED_PUBLIC_HOST)
    #[arg(long)]
    pub(crate) public_host: Option<String>,
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let ExportArgs {
        catalog,
        public_root,
        public_host,
    } = args;

    let mut config = AppConfig::load()?;
    if let Some(root) = public_root {
        config.feed.public_root = root;
    }
    if let Some(host) = public_host {
        config.feed.public_host = host;
    }
    telemetry::init(&config.telemetry)?;

    let catalog = Arc::new(InMemoryCatalog::from_path(&catalog)?);
    let exporter = FeedExporter::new(
        catalog,
        Arc::new(FileSystemSink),
        config.feed.publish_target(),
        config.feed.fallback_state.clone(),
    );

    let report = exporter.run_pass()?;
    println!("{}", render_report(&report));
    Ok(())
}

fn render_report(report: &PassReport) -> String {
    match report {
        PassReport::Disabled => {
            "Feed generation disabled: the catalog carries no feedConfig".to_string()
        }
        PassReport::Published {
            feed,
            listings,
            filtered_out,
            skipped,
        } => {
            let mut lines = vec![
                "Feed published".to_string(),
                format!("  URL: {}", feed.url),
                format!("  File: {} ({} bytes)", feed.path.display(), feed.bytes),
                format!("  Last update: {}", feed.last_update.to_rfc3339()),
                format!(
                    "  Listings: {listings} exported, {filtered_out} filtered, {} skipped",
                    skipped.len()
                ),
            ];
            lines.extend(skipped.iter().map(|diagnostic| format!("    - {diagnostic}")));
            lines.join("\n")
        }
    }
}
