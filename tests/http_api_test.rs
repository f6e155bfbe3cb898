use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use eventwatch::api::{EventApi, HttpApi, TopicApi};
use eventwatch::config::Config;
use eventwatch::error::ApiError;
use eventwatch::models::{NotificationFrequency, Topic, TopicPatch};
use eventwatch::render;
use eventwatch::search::{EventSearchController, SearchView};
use eventwatch::topics::{Phase, TopicListController};

#[derive(Default)]
struct Backend {
    topics: Vec<Topic>,
    next_id: i64,
    list_calls: usize,
    mutation_calls: usize,
    fail_list: bool,
}

type Shared = Arc<Mutex<Backend>>;

fn stamp() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_micro_opt(9, 0, 0, 1)
        .unwrap()
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Response {
    let keyword = params.get("keyword").cloned().unwrap_or_default();
    if keyword.trim().is_empty() {
        return detail(StatusCode::BAD_REQUEST, "keyword is required");
    }
    let events: Vec<Value> = if keyword == "AI" {
        vec![
            json!({"title": "AI Conf", "datetime": "2024-06-01", "location": "Tokyo", "url": "https://x/1"}),
            json!({"title": "AI Night", "datetime": "2024-06-08", "location": "Online", "url": "https://x/2"}),
        ]
    } else {
        Vec::new()
    };
    Json(json!({ "keyword": keyword, "count": events.len(), "events": events })).into_response()
}

async fn list_topics(State(state): State<Shared>) -> Response {
    let mut backend = state.lock().unwrap();
    backend.list_calls += 1;
    if backend.fail_list {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(backend.topics.clone()).into_response()
}

async fn create_topic(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut backend = state.lock().unwrap();
    backend.mutation_calls += 1;
    let keyword = body["keyword"].as_str().unwrap_or_default().to_string();
    if backend.topics.iter().any(|t| t.keyword == keyword) {
        return detail(StatusCode::BAD_REQUEST, "Topic already exists");
    }
    let frequency: NotificationFrequency =
        serde_json::from_value(body["notification_frequency"].clone()).unwrap_or_default();
    backend.next_id += 1;
    let topic = Topic {
        id: backend.next_id,
        keyword,
        notification_frequency: frequency,
        is_active: body["is_active"].as_bool().unwrap_or(true),
        user_id: Some("default".into()),
        created_at: stamp(),
        updated_at: stamp(),
    };
    backend.topics.push(topic.clone());
    Json(topic).into_response()
}

async fn update_topic(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(patch): Json<TopicPatch>,
) -> Response {
    let mut backend = state.lock().unwrap();
    backend.mutation_calls += 1;
    let Some(topic) = backend.topics.iter_mut().find(|t| t.id == id) else {
        return detail(StatusCode::NOT_FOUND, "Topic not found");
    };
    if let Some(active) = patch.is_active {
        topic.is_active = active;
    }
    if let Some(frequency) = patch.notification_frequency {
        topic.notification_frequency = frequency;
    }
    Json(topic.clone()).into_response()
}

async fn delete_topic(State(state): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut backend = state.lock().unwrap();
    backend.mutation_calls += 1;
    let before = backend.topics.len();
    backend.topics.retain(|t| t.id != id);
    if backend.topics.len() == before {
        return detail(StatusCode::NOT_FOUND, "Topic not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn spawn_backend() -> (HttpApi, Shared) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state: Shared = Arc::new(Mutex::new(Backend::default()));
    let app = Router::new()
        .route("/api/search", get(search))
        .route("/api/topics", get(list_topics).post(create_topic))
        .route("/api/topics/:id", axum::routing::put(update_topic).delete(delete_topic))
        .route("/health", get(health))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let config = Config::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    (HttpApi::new(config).unwrap(), state)
}

#[tokio::test]
async fn search_returns_envelope() {
    let (api, _) = spawn_backend().await;
    let mut controller = EventSearchController::new(api);

    controller.search("AI").await;

    match controller.state().view() {
        SearchView::Results(results) => {
            assert_eq!(results.count, 2);
            assert_eq!(results.events[1].location, "Online");
        }
        other => panic!("unexpected view: {:?}", other),
    }
    let text = render::search_text(controller.state(), 80);
    assert!(text.contains("Found 2 events for \"AI\""));
}

#[tokio::test]
async fn search_without_hits_shows_no_results() {
    let (api, _) = spawn_backend().await;
    let mut controller = EventSearchController::new(api);

    controller.search("zzznotfound").await;

    assert!(matches!(controller.state().view(), SearchView::NoResults(_)));
    assert!(render::search_text(controller.state(), 80).contains(render::NO_RESULTS_MESSAGE));
}

#[tokio::test]
async fn search_keyword_is_url_encoded() {
    let (api, _) = spawn_backend().await;
    let results = api.search_events("音楽 & jazz").await.unwrap();
    assert_eq!(results.keyword, "音楽 & jazz");
    assert_eq!(results.count, 0);
}

#[tokio::test]
async fn create_toggle_delete_against_http_backend() {
    let (api, state) = spawn_backend().await;
    let mut controller = TopicListController::new(api);
    controller.fetch_all().await;
    assert_eq!(controller.state().phase(), &Phase::Loaded);

    controller.create("Rust", NotificationFrequency::Daily).await;
    let rust = controller.state().topics()[0].clone();
    assert_eq!(rust.keyword, "Rust");
    assert_eq!(rust.notification_frequency, NotificationFrequency::Daily);
    assert!(rust.is_active);

    controller.toggle_active(&rust).await;
    assert!(!controller.find(rust.id).unwrap().is_active);

    controller.request_delete(&rust).await;
    controller.confirm_delete().await;
    assert!(controller.state().topics().is_empty());
    assert_eq!(controller.state().failure(), None);

    let backend = state.lock().unwrap();
    assert_eq!(backend.mutation_calls, 3);
    assert_eq!(backend.list_calls, 1 + 3);
}

#[tokio::test]
async fn duplicate_create_surfaces_server_detail() {
    let (api, _) = spawn_backend().await;
    let mut controller = TopicListController::new(api);
    controller.fetch_all().await;

    controller.create("Rust", NotificationFrequency::Weekly).await;
    controller.create("Rust", NotificationFrequency::Weekly).await;

    let dialog = controller.state().dialog();
    assert!(dialog.open);
    assert_eq!(dialog.error.as_deref(), Some("Topic already exists"));
    assert_eq!(controller.state().topics().len(), 1);
}

#[tokio::test]
async fn missing_topic_maps_detail_to_server_error() {
    let (api, _) = spawn_backend().await;
    let err = api
        .update_topic(42, &TopicPatch::active(false))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Server("Topic not found".into()));

    let err = api.delete_topic(42).await.unwrap_err();
    assert_eq!(err, ApiError::Server("Topic not found".into()));
}

#[tokio::test]
async fn list_failure_without_body_is_status_error() {
    let (api, state) = spawn_backend().await;
    state.lock().unwrap().fail_list = true;

    assert_eq!(api.list_topics().await.unwrap_err(), ApiError::Status(500));

    let mut controller = TopicListController::new(api);
    controller.fetch_all().await;
    assert_eq!(
        controller.state().phase(),
        &Phase::Error("Failed to load topics".into())
    );
}

#[tokio::test]
async fn health_reports_status() {
    let (api, _) = spawn_backend().await;
    assert_eq!(api.health().await.unwrap().status, "ok");
}

#[tokio::test]
async fn unreachable_api_is_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = Config::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let api = HttpApi::new(config).unwrap();
    assert!(matches!(api.list_topics().await, Err(ApiError::Transport(_))));
}
