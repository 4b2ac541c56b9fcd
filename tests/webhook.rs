//! Adapter-level tests: the router with in-memory collaborators.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use eventbot::app::{router, AppState, BotIdentity};
use eventbot::engine::{ConversationEngine, INTERESTS_PROMPT};
use eventbot::mocks::{CannedCompletion, RecordingCalendar, StaticCatalog};
use eventbot::store::MemoryStateStore;
use eventbot::types::{ConversationPhase, Event};

fn test_state(store: MemoryStateStore, events: Vec<Event>) -> Arc<AppState> {
    let engine = ConversationEngine::new(
        Arc::new(store),
        Some(Arc::new(StaticCatalog::new(events))),
        Some(Arc::new(RecordingCalendar::new())),
        Some(Arc::new(CannedCompletion::new("respuesta del modelo"))),
    );
    Arc::new(AppState {
        engine: Arc::new(engine),
        bot: BotIdentity {
            app_id: "bot-app-id".to_string(),
            name: "Evi".to_string(),
        },
        database_available: false,
        calendar_available: true,
        completion_available: true,
    })
}

fn message_activity(user_id: &str, text: &str) -> Value {
    json!({
        "type": "message",
        "id": "act-1",
        "text": text,
        "from": { "id": user_id, "name": "Ana" },
        "conversation": { "id": "conv-1" }
    })
}

fn post_messages(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn non_json_content_type_is_rejected_with_415() {
    let app = router(test_state(MemoryStateStore::new(), vec![]));

    let request = Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hola"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn malformed_envelope_is_rejected_with_400() {
    let app = router(test_state(MemoryStateStore::new(), vec![]));

    let request = Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_sender_id_is_rejected_with_400() {
    let app = router(test_state(MemoryStateStore::new(), vec![]));

    let body = json!({ "type": "message", "text": "hola" });
    let response = app.oneshot(post_messages(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_message_activities_are_acknowledged_without_a_reply() {
    let store = MemoryStateStore::new();
    let app = router(test_state(store.clone(), vec![]));

    let body = json!({
        "type": "conversationUpdate",
        "from": { "id": "user-1" },
        "conversation": { "id": "conv-1" }
    });
    let response = app.oneshot(post_messages(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert!(payload.get("text").is_none());
    // No state was touched for the sender either.
    assert!(store.snapshot("user-1").is_none());
}

#[tokio::test]
async fn first_message_yields_interests_prompt_and_persists_phase() {
    let store = MemoryStateStore::new();
    let app = router(test_state(store.clone(), vec![]));

    let response = app
        .oneshot(post_messages(&message_activity("user-1", "hola")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["type"], "message");
    assert_eq!(payload["text"], INTERESTS_PROMPT);
    assert_eq!(payload["from"]["id"], "bot-app-id");
    assert_eq!(payload["recipient"]["id"], "user-1");
    assert_eq!(payload["conversation"]["id"], "conv-1");
    assert_eq!(payload["replyToId"], "act-1");

    let stored = store.snapshot("user-1").unwrap();
    assert_eq!(stored.phase, ConversationPhase::AwaitingInterests);
}

#[tokio::test]
async fn full_capture_flow_over_the_webhook() {
    let store = MemoryStateStore::new();
    let app = router(test_state(store.clone(), vec![]));

    let first = app
        .clone()
        .oneshot(post_messages(&message_activity("user-1", "hola")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_messages(&message_activity("user-1", "ia, cloud")))
        .await
        .unwrap();
    let payload = body_json(second).await;
    assert!(payload["text"].as_str().unwrap().contains("ia, cloud"));

    let stored = store.snapshot("user-1").unwrap();
    assert_eq!(
        stored.phase,
        ConversationPhase::Ready {
            interests: vec!["ia".into(), "cloud".into()],
            pending_event: None,
        }
    );
}

#[tokio::test]
async fn health_reports_per_dependency_availability() {
    let app = router(test_state(MemoryStateStore::new(), vec![]));

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["database"], "unavailable");
    assert_eq!(payload["calendar"], "available");
    assert_eq!(payload["completion"], "available");
}
