mod common;

use axum::http::StatusCode;
use axum_test::TestServer;

// ---------------------------------------------------------------------------
// GET /rooms/by-section/{section_id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn room_by_section_creates_then_returns_same_room() {
    let (app, _state, _store) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let first = server.get("/rooms/by-section/7").await;
    first.assert_status_ok();
    let first: serde_json::Value = first.json();
    assert!(first["id"].as_i64().unwrap() > 0);
    assert_eq!(first["section_id"], 7);
    assert_eq!(first["name"], "Section 7 Chat");

    // Second lookup must return the same room (idempotent get-or-create).
    let second = server.get("/rooms/by-section/7").await;
    second.assert_status_ok();
    let second: serde_json::Value = second.json();
    assert_eq!(second["id"], first["id"]);
}

#[tokio::test]
async fn room_by_section_rejects_invalid_ids() {
    let (app, _state, _store) = common::test_app();
    let server = TestServer::new(app).unwrap();

    for bad in ["abc", "-3", "0", "1.5"] {
        let resp = server.get(&format!("/rooms/by-section/{bad}")).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = resp.json();
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }
}

// ---------------------------------------------------------------------------
// GET /rooms/{room_id}/messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_messages_returns_ascending_order() {
    let (app, _state, store) = common::test_app();
    let server = TestServer::new(app).unwrap();
    store.add_user(1, "Ada", None);

    let room = server.get("/rooms/by-section/7").await;
    let room_id = room.json::<serde_json::Value>()["id"].as_i64().unwrap();

    for body in ["first", "second", "third"] {
        let resp = server
            .post(&format!("/rooms/{room_id}/messages"))
            .json(&serde_json::json!({ "sender_id": 1, "message": body }))
            .await;
        resp.assert_status(StatusCode::CREATED);
    }

    let resp = server.get(&format!("/rooms/{room_id}/messages")).await;
    resp.assert_status_ok();
    let messages: Vec<serde_json::Value> = resp.json();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["message"], "first");
    assert_eq!(messages[2]["message"], "third");
    assert!(messages[0]["id"].as_i64().unwrap() < messages[2]["id"].as_i64().unwrap());
}

#[tokio::test]
async fn list_messages_for_unknown_room_is_empty() {
    let (app, _state, _store) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/rooms/123456/messages").await;
    resp.assert_status_ok();
    let messages: Vec<serde_json::Value> = resp.json();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn list_messages_rejects_invalid_room_id() {
    let (app, _state, _store) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/rooms/not-a-number/messages").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// POST /rooms/{room_id}/messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_message_returns_created_enriched_view() {
    let (app, _state, store) = common::test_app();
    let server = TestServer::new(app).unwrap();
    store.add_user(1, "Ada", Some("https://cdn.example/ada.png"));

    let room = server.get("/rooms/by-section/7").await;
    let room_id = room.json::<serde_json::Value>()["id"].as_i64().unwrap();

    let resp = server
        .post(&format!("/rooms/{room_id}/messages"))
        .json(&serde_json::json!({ "sender_id": 1, "message": "Hello, world!" }))
        .await;

    resp.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = resp.json();
    assert!(body["id"].as_i64().unwrap() > 0);
    assert_eq!(body["room_id"], room_id);
    assert_eq!(body["sender_id"], 1);
    assert_eq!(body["sender_name"], "Ada");
    assert_eq!(body["sender_avatar"], "https://cdn.example/ada.png");
    assert_eq!(body["message"], "Hello, world!");
    assert_eq!(body["message_type"], "text");
    assert!(body["file_url"].is_null());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn post_message_validates_required_fields() {
    let (app, _state, store) = common::test_app();
    let server = TestServer::new(app).unwrap();
    store.add_user(1, "Ada", None);

    let room = server.get("/rooms/by-section/7").await;
    let room_id = room.json::<serde_json::Value>()["id"].as_i64().unwrap();

    // Missing message.
    let resp = server
        .post(&format!("/rooms/{room_id}/messages"))
        .json(&serde_json::json!({ "sender_id": 1 }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Missing sender.
    let resp = server
        .post(&format!("/rooms/{room_id}/messages"))
        .json(&serde_json::json!({ "message": "hi" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    // Whitespace-only message.
    let resp = server
        .post(&format!("/rooms/{room_id}/messages"))
        .json(&serde_json::json!({ "sender_id": 1, "message": "   " }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    // File message without a URL.
    let resp = server
        .post(&format!("/rooms/{room_id}/messages"))
        .json(&serde_json::json!({
            "sender_id": 1,
            "message": "doc",
            "message_type": "file"
        }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    // None of the rejected posts left a row behind.
    let resp = server.get(&format!("/rooms/{room_id}/messages")).await;
    let messages: Vec<serde_json::Value> = resp.json();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn post_message_to_unknown_room_is_not_found() {
    let (app, _state, store) = common::test_app();
    let server = TestServer::new(app).unwrap();
    store.add_user(1, "Ada", None);

    let resp = server
        .post("/rooms/987654/messages")
        .json(&serde_json::json!({ "sender_id": 1, "message": "hi" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state, _store) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/health").await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["status"], "ok");
}
