use crate::cli::ServeArgs;
use crate::infra::{load_catalog, AppState, FeedState};
use crate::routes::with_feed_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use listing_feed::config::AppConfig;
use listing_feed::error::AppError;
use listing_feed::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = Arc::new(load_catalog(&config.feed)?);
    let feed_state = FeedState::new(catalog, &config.feed);

    let app = with_feed_routes(feed_state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        public_root = %config.feed.public_root.display(),
        "listing feed service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
