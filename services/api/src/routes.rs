use crate::infra::{AppState, FeedState};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use listing_feed::error::AppError;
use listing_feed::feed::{
    CatalogSource, FeedConfig, FeedStatus, GenerationPhase, PassOutcome, PropertyRecord,
    TriggerAdmission,
};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub(crate) struct CatalogChangeResponse {
    pub(crate) id: i64,
    pub(crate) feed: TriggerAdmission,
}

pub(crate) fn feed_router(state: FeedState) -> Router {
    Router::new()
        .route("/api/v1/feed/status", get(feed_status_endpoint))
        .route("/api/v1/feed/generate", post(generate_feed_endpoint))
        .route("/api/v1/feed/config", put(feed_config_endpoint))
        .route(
            "/api/v1/catalog/properties/:id",
            put(upsert_property_endpoint).delete(remove_property_endpoint),
        )
        .with_state(state)
}

pub(crate) fn with_feed_routes(state: FeedState) -> Router {
    feed_router(state)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn feed_status_endpoint(State(state): State<FeedState>) -> Json<FeedStatus> {
    Json(state.trigger.status())
}

/// Requests a pass and answers once the controller settles back to idle.
///
/// When a pass is already running the request folds into its rerun, so the
/// reported outcome is that of the latest pass.
pub(crate) async fn generate_feed_endpoint(State(state): State<FeedState>) -> Response {
    let mut status = state.trigger.subscribe();
    let seen = status.borrow_and_update().completed_passes;

    let admission = state.trigger.request_manual_generation();
    let settled = match status
        .wait_for(|status| status.phase == GenerationPhase::Idle && status.completed_passes > seen)
        .await
    {
        Ok(settled) => settled.clone(),
        Err(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "feed generator stopped" })),
            )
                .into_response()
        }
    };

    match settled.last_outcome {
        Some(PassOutcome::Completed { report }) => (
            StatusCode::OK,
            Json(json!({ "admission": admission, "report": report })),
        )
            .into_response(),
        Some(PassOutcome::Failed { reason }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "admission": admission, "error": reason })),
        )
            .into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "feed pass finished without an outcome" })),
        )
            .into_response(),
    }
}

/// Replaces the feed configuration; `null` switches generation off.
///
/// A stored `lastUpdate` survives when the request omits one.
pub(crate) async fn feed_config_endpoint(
    State(state): State<FeedState>,
    Json(config): Json<Option<FeedConfig>>,
) -> Response {
    let previous = match state.catalog.feed_config() {
        Ok(previous) => previous,
        Err(err) => return AppError::from(err).into_response(),
    };

    let config = config.map(|mut config| {
        if config.last_update.is_none() {
            config.last_update = previous.and_then(|previous| previous.last_update);
        }
        config
    });
    state.catalog.set_feed_config(config.clone());

    (StatusCode::OK, Json(config)).into_response()
}

pub(crate) async fn upsert_property_endpoint(
    State(state): State<FeedState>,
    Path(id): Path<i64>,
    Json(mut record): Json<PropertyRecord>,
) -> (StatusCode, Json<CatalogChangeResponse>) {
    record.id = id;
    let replaced = state.catalog.upsert(record);
    let feed = state.trigger.notify_catalog_mutated();

    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(CatalogChangeResponse { id, feed }))
}

pub(crate) async fn remove_property_endpoint(
    State(state): State<FeedState>,
    Path(id): Path<i64>,
) -> Response {
    if !state.catalog.remove(id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("property {id} not found") })),
        )
            .into_response();
    }

    let feed = state.trigger.notify_catalog_mutated();
    (StatusCode::OK, Json(CatalogChangeResponse { id, feed })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use listing_feed::config::FeedSettings;
    use listing_feed::feed::{CatalogSnapshot, InMemoryCatalog, LooseNumber, PropertyStatus};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::path::Path as FsPath;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn listing(id: i64) -> PropertyRecord {
        PropertyRecord {
            id,
            property_type: "office".to_string(),
            status: PropertyStatus::Available,
            address: "Av. Paulista, 1000".to_string(),
            city: "São Paulo-SP".to_string(),
            area: Some(LooseNumber::from(42_i64)),
            price: Some(LooseNumber::from(3500_i64)),
            description: Some("Sala comercial".into()),
            ..PropertyRecord::default()
        }
    }

    fn feed_state(root: &FsPath, config: Option<FeedConfig>) -> FeedState {
        let catalog = Arc::new(InMemoryCatalog::new(CatalogSnapshot {
            properties: vec![listing(1)],
            feed_config: config,
        }));
        let settings = FeedSettings {
            public_root: root.to_path_buf(),
            public_host: "https://imob.example.com".to_string(),
            fallback_state: "SP".to_string(),
            catalog_path: None,
        };
        FeedState::new(catalog, &settings)
    }

    fn app(state: FeedState) -> Router {
        let app_state = AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_feed_routes(state).layer(Extension(app_state))
    }

    async fn read_json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn generate_publishes_and_reports_the_pass() {
        let root = tempfile::tempdir().expect("temp dir");
        let state = feed_state(root.path(), Some(FeedConfig::default()));

        let response = app(state.clone())
            .oneshot(
                Request::post("/api/v1/feed/generate")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload["admission"], "started");
        assert_eq!(payload["report"]["status"], "published");
        assert_eq!(payload["report"]["listings"], 1);
        assert_eq!(
            payload["report"]["feed"]["url"],
            "https://imob.example.com/vivareal.xml"
        );
        assert!(root.path().join("vivareal.xml").is_file());
        assert_eq!(state.trigger.status().completed_passes, 1);
    }

    #[tokio::test]
    async fn generate_reports_publish_failure_as_server_error() {
        let root = tempfile::tempdir().expect("temp dir");
        let config = FeedConfig {
            custom_xml_path: Some("../outside.xml".to_string()),
            ..FeedConfig::default()
        };

        let response = generate_feed_endpoint(State(feed_state(root.path(), Some(config)))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payload = read_json_body(response).await;
        assert!(payload["error"]
            .as_str()
            .expect("error message")
            .starts_with("publish failed"));
    }

    #[tokio::test]
    async fn generate_without_config_reports_disabled() {
        let root = tempfile::tempdir().expect("temp dir");

        let response = generate_feed_endpoint(State(feed_state(root.path(), None))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload["report"]["status"], "disabled");
    }

    #[tokio::test]
    async fn upsert_creates_then_replaces_listing() {
        let root = tempfile::tempdir().expect("temp dir");
        let state = feed_state(root.path(), Some(FeedConfig::default()));

        let (status, Json(body)) = upsert_property_endpoint(
            State(state.clone()),
            Path(7),
            Json(listing(0)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.id, 7);
        assert_eq!(body.feed, TriggerAdmission::Ignored);

        let (status, _) =
            upsert_property_endpoint(State(state.clone()), Path(7), Json(listing(0))).await;
        assert_eq!(status, StatusCode::OK);

        let ids: Vec<i64> = state
            .catalog
            .snapshot()
            .expect("snapshot")
            .properties
            .iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(ids, vec![1, 7]);
    }

    #[tokio::test]
    async fn mutation_starts_pass_when_automatic_updates_are_on() {
        let root = tempfile::tempdir().expect("temp dir");
        let state = feed_state(
            root.path(),
            Some(FeedConfig {
                xml_automatic_update: true,
                ..FeedConfig::default()
            }),
        );
        let mut status = state.trigger.subscribe();

        let response = remove_property_endpoint(State(state.clone()), Path(1)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload["feed"], "started");

        let settled = status
            .wait_for(|status| {
                status.phase == GenerationPhase::Idle && status.completed_passes == 1
            })
            .await
            .expect("trigger alive")
            .clone();
        assert!(matches!(
            settled.last_outcome,
            Some(PassOutcome::Completed { .. })
        ));
    }

    #[tokio::test]
    async fn removing_unknown_listing_is_not_found() {
        let root = tempfile::tempdir().expect("temp dir");
        let state = feed_state(root.path(), Some(FeedConfig::default()));

        let response = remove_property_endpoint(State(state), Path(99)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn config_replacement_keeps_last_update_and_accepts_null() {
        let root = tempfile::tempdir().expect("temp dir");
        let state = feed_state(root.path(), Some(FeedConfig::default()));
        let stamp = chrono::Utc::now();
        state.catalog.record_publish(stamp).expect("record");

        let response = app(state.clone())
            .oneshot(
                Request::put("/api/v1/feed/config")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"vivaRealUsername":"imob","xmlAutomaticUpdate":true}"#,
                    ))
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);

        let stored = state
            .catalog
            .feed_config()
            .expect("config")
            .expect("config present");
        assert!(stored.xml_automatic_update);
        assert_eq!(stored.viva_real_username.as_deref(), Some("imob"));
        assert_eq!(stored.last_update, Some(stamp));

        let response = feed_config_endpoint(State(state.clone()), Json(None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.catalog.feed_config().expect("config").is_none());
    }

    #[tokio::test]
    async fn status_route_reports_idle_controller() {
        let root = tempfile::tempdir().expect("temp dir");

        let response = app(feed_state(root.path(), None))
            .oneshot(
                Request::get("/api/v1/feed/status")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload["phase"], "idle");
        assert_eq!(payload["completed_passes"], 0);
        assert_eq!(payload["last_outcome"], Value::Null);
    }
}
