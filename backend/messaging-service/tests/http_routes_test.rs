mod common;

use actix_web::{http::StatusCode, test, web, App};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::{harness, retention};
use messaging_service::middleware::guards::USER_ID_HEADER;
use messaging_service::routes::configure_routes;
use messaging_service::state::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

fn state() -> AppState {
    let h = harness(retention(3, true));
    AppState {
        facade: Arc::new(h.facade),
    }
}

#[actix_web::test]
async fn send_and_read_conversation() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure_routes),
    )
    .await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    for i in 0..4 {
        let req = test::TestRequest::post()
            .uri("/api/v1/messages")
            .insert_header((USER_ID_HEADER, a.to_string()))
            .set_json(json!({
                "receiver_id": b,
                "message_type": "TEXT",
                "text_content": format!("hello {i}")
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["sender_id"], json!(a));
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/messages/conversation/{a}"))
        .insert_header((USER_ID_HEADER, b.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let messages = body["data"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["text_content"], "hello 3");
}

#[actix_web::test]
async fn missing_identity_is_unauthorized() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/message-retention/config")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn self_message_and_gate_errors_map_to_statuses() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure_routes),
    )
    .await;
    let a = Uuid::new_v4();

    let req = test::TestRequest::post()
        .uri("/api/v1/messages")
        .insert_header((USER_ID_HEADER, a.to_string()))
        .set_json(json!({ "receiver_id": a, "message_type": "TEXT", "text_content": "me" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_PAIR");
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn delete_requires_sender() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure_routes),
    )
    .await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let req = test::TestRequest::post()
        .uri("/api/v1/messages")
        .insert_header((USER_ID_HEADER, a.to_string()))
        .set_json(json!({ "receiver_id": b, "message_type": "TEXT", "text_content": "hi" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/messages/{id}"))
        .insert_header((USER_ID_HEADER, b.to_string()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/messages/{id}"))
        .insert_header((USER_ID_HEADER, a.to_string()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/messages/{id}"))
        .insert_header((USER_ID_HEADER, a.to_string()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn media_upload_as_base64() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure_routes),
    )
    .await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/media")
        .insert_header((USER_ID_HEADER, a.to_string()))
        .set_json(json!({
            "receiver_id": b,
            "message_type": "IMAGE",
            "file_name": "cat.png",
            "data_base64": STANDARD.encode([1u8, 2, 3, 4])
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let path = body["data"]["media_path"].as_str().unwrap();
    assert!(path.contains("images/image_"));
    assert!(path.ends_with(".png"));

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/media")
        .insert_header((USER_ID_HEADER, a.to_string()))
        .set_json(json!({
            "receiver_id": b,
            "message_type": "IMAGE",
            "data_base64": "***not base64***"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn retention_admin_endpoints() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure_routes),
    )
    .await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let req = test::TestRequest::put()
        .uri("/api/v1/message-retention/config")
        .insert_header((USER_ID_HEADER, a.to_string()))
        .set_json(json!({ "count": 101, "enabled": true }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri("/api/v1/message-retention/config")
        .insert_header((USER_ID_HEADER, a.to_string()))
        .set_json(json!({ "count": 10, "enabled": false }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], json!({ "count": 10, "enabled": false }));

    for _ in 0..12 {
        let req = test::TestRequest::post()
            .uri("/api/v1/messages")
            .insert_header((USER_ID_HEADER, a.to_string()))
            .set_json(json!({ "receiver_id": b, "message_type": "TEXT", "text_content": "m" }))
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/message-retention/stats/{b}"))
        .insert_header((USER_ID_HEADER, a.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total_messages"], 12);
    assert_eq!(body["data"]["messages_to_delete"], 2);

    let req = test::TestRequest::put()
        .uri("/api/v1/message-retention/config")
        .insert_header((USER_ID_HEADER, a.to_string()))
        .set_json(json!({ "count": 10, "enabled": true }))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/message-retention/cleanup/{b}"))
        .insert_header((USER_ID_HEADER, a.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["deleted"], 2);
    assert_eq!(body["data"]["remaining"], 10);

    let req = test::TestRequest::post()
        .uri("/api/v1/message-retention/cleanup-all")
        .insert_header((USER_ID_HEADER, b.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["conversations"], 1);
    assert_eq!(body["data"]["deleted"], 0);
}

#[actix_web::test]
async fn health_and_metrics() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn plain_send_route_rejects_media_path() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state()))
            .configure(configure_routes),
    )
    .await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let req = test::TestRequest::post()
        .uri("/api/v1/messages")
        .insert_header((USER_ID_HEADER, a.to_string()))
        .set_json(json!({
            "receiver_id": b,
            "message_type": "IMAGE",
            "media_path": "images/image_someone_else.png"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_REQUEST");
}
