use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use campdash_core::{Campaign, Environment, Store, SupplierCatalog};
use campdash_db::{connect_pool, PoolConfig};
use tower::ServiceExt;

use super::*;

/// State pointing at a port nothing listens on, so every database call fails
/// fast with a connectivity error.
fn offline_state(dir: &Path) -> AppState {
    let config = AppConfig {
        database_url: "postgres://campdash@127.0.0.1:1/erp".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        campaigns_path: dir.join("campanhas.csv"),
        catalog_dir: dir.join("catalog"),
        db_schema: "D-1".to_string(),
        db_max_connections: 1,
        db_min_connections: 0,
        db_acquire_timeout_secs: 1,
        legacy_scope: false,
        excluded_sellers: vec![],
        excluded_cfops: vec![],
    };
    let pool = connect_pool(
        &config.database_url,
        PoolConfig {
            max_connections: 1,
            min_connections: 0,
            acquire_timeout_secs: 1,
        },
    )
    .expect("lazy pool");
    let source = PgSource::from_app_config(pool, &config).expect("source");
    AppState::new(&config, source)
}

fn seed_catalog(state: &AppState) {
    state
        .catalog
        .save_stores(&[Store::new("01", "Centro"), Store::new("08", "Matriz")])
        .expect("save stores");
    state
        .catalog
        .save_suppliers(&[SupplierCatalog {
            supplier: "MANN".to_string(),
            groups: BTreeSet::from(["FIL".to_string(), "OLE".to_string()]),
        }])
        .expect("save suppliers");
}

fn campaign_body(end_date: &str) -> String {
    format!(
        r#"{{
            "name": "Filtros junho",
            "supplier": "MANN",
            "groups": ["FIL", "OLE"],
            "start_date": "2024-06-01",
            "end_date": "{end_date}",
            "goal_type": "per_store",
            "per_store_targets": {{"08": 120}}
        }}"#
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = serde_json::from_slice(&body).expect("json parse");
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request")
}

#[test]
fn api_error_validation_error_maps_to_bad_request() {
    let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn api_error_database_unavailable_maps_to_service_unavailable() {
    let response =
        ApiError::new("req-1", "database_unavailable", "sales database unavailable").into_response();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn api_error_unknown_code_maps_to_internal_error() {
    let response = ApiError::new("req-1", "internal_error", "boom").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn metrics_errors_map_to_codes() {
    let validation = map_metrics_error("r", &MetricsError::Validation(ValidationError::EmptyGroups));
    assert_eq!(validation.error.code, "validation_error");

    let connectivity = map_metrics_error(
        "r",
        &MetricsError::Connectivity(campdash_db::DbError::InvalidSchema("x".to_string())),
    );
    assert_eq!(connectivity.error.code, "database_unavailable");
}

#[test]
fn campaign_view_omits_absent_fields() {
    let view = campaigns::CampaignView {
        campaign: Campaign::try_from_draft(
            serde_json::from_str::<campdash_core::CampaignDraft>(&campaign_body("2024-06-30"))
                .expect("draft"),
        )
        .expect("campaign"),
        progress: None,
        error: Some("sales database unavailable".to_string()),
    };
    let json = serde_json::to_value(&view).expect("serialize");
    assert!(json.get("progress").is_none());
    assert_eq!(json["error"], "sales database unavailable");
    assert_eq!(json["campaign"]["goal_type"], "per_store");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = build_app(offline_state(dir.path()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/cache/clear")
                .header(REQUEST_ID_HEADER, "req-abc")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-abc");
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("json parse");
    assert_eq!(json["meta"]["request_id"], "req-abc");
    assert_eq!(json["data"]["cleared"], 0);
}

#[tokio::test]
async fn create_campaign_rejects_inverted_dates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = offline_state(dir.path());
    let path = state.campaigns.path().to_path_buf();

    let (status, json) = send(
        build_app(state),
        post_json("/api/v1/campaigns", campaign_body("2024-05-01")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert!(!path.exists());
}

#[tokio::test]
async fn create_campaign_appends_and_returns_created() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = offline_state(dir.path());
    let store = state.campaigns.clone();

    let (status, json) = send(
        build_app(state),
        post_json("/api/v1/campaigns", campaign_body("2024-06-30")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["name"], "Filtros junho");
    let saved = store.load().expect("load");
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].per_store_targets().get("08"), Some(&120));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_all_land_in_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = offline_state(dir.path());
    let store = state.campaigns.clone();
    let app = build_app(state);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            send(app, post_json("/api/v1/campaigns", campaign_body("2024-06-30")))
                .await
                .0
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("join"), StatusCode::CREATED);
    }

    assert_eq!(store.load().expect("load").len(), 8);
}

#[tokio::test]
async fn list_campaigns_without_file_is_empty() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, json) = send(build_app(offline_state(dir.path())), get("/api/v1/campaigns")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn list_campaigns_isolates_metrics_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = offline_state(dir.path());
    seed_catalog(&state);
    let app = build_app(state);

    let (status, _) = send(
        app.clone(),
        post_json("/api/v1/campaigns", campaign_body("2024-06-30")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(app, get("/api/v1/campaigns")).await;

    assert_eq!(status, StatusCode::OK);
    let month = &json["data"][0];
    assert_eq!(month["month"], "2024-06");
    let campaign = &month["campaigns"][0];
    assert_eq!(campaign["campaign"]["name"], "Filtros junho");
    assert!(campaign["progress"].is_null());
    assert!(campaign["error"]
        .as_str()
        .is_some_and(|e| e.contains("unavailable")));
}

#[tokio::test]
async fn catalog_reads_come_from_cached_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = offline_state(dir.path());
    seed_catalog(&state);
    let app = build_app(state);

    let (status, stores) = send(app.clone(), get("/api/v1/catalog/stores")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stores["data"][1]["display_name"], "Matriz");

    let (_, suppliers) = send(app.clone(), get("/api/v1/catalog/suppliers")).await;
    assert_eq!(suppliers["data"][0], "MANN");

    let (_, groups) = send(app, get("/api/v1/catalog/suppliers/MANN/groups")).await;
    assert_eq!(groups["data"], serde_json::json!(["FIL", "OLE"]));
}

#[tokio::test]
async fn unknown_supplier_has_empty_groups() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = offline_state(dir.path());
    seed_catalog(&state);

    let (status, json) = send(
        build_app(state),
        get("/api/v1/catalog/suppliers/ACME/groups"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], serde_json::json!([]));
}

#[tokio::test]
async fn catalog_rebuild_without_database_is_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, json) = send(
        build_app(offline_state(dir.path())),
        get("/api/v1/catalog/stores"),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "database_unavailable");
}

#[tokio::test]
async fn health_reports_degraded_without_database() {
    let dir = tempfile::tempdir().expect("tempdir");

    let (status, json) = send(build_app(offline_state(dir.path())), get("/api/v1/health")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["data"]["database"], "unavailable");
}
