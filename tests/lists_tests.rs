use actix_web::{test, web, App};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use noise_signal::api::{self, AppState};
use noise_signal::store::Store;

fn app_state() -> AppState {
    AppState {
        store: Arc::new(Store::in_memory().unwrap()),
        backgrounds_dir: PathBuf::from("backgrounds"),
    }
}

const BOUNDARY: &str = "----noise-signal-test-boundary";

fn multipart_header() -> (&'static str, String) {
    (
        "Content-Type",
        format!("multipart/form-data; boundary={}", BOUNDARY),
    )
}

fn text_part(body: &mut Vec<u8>, name: &str, value: &str) {
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        )
        .as_bytes(),
    );
}

fn file_part(body: &mut Vec<u8>, name: &str, filename: &str, content_type: &str, data: &[u8]) {
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            BOUNDARY, name, filename, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
}

fn close_body(mut body: Vec<u8>) -> Vec<u8> {
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn item_body(text: &str) -> Vec<u8> {
    let mut body = Vec::new();
    text_part(&mut body, "text", text);
    close_body(body)
}

/// Posts a text-only item and returns the list response.
macro_rules! add_item {
    ($app:expr, $list:expr, $text:expr) => {{
        let req = test::TestRequest::post()
            .uri(&format!("/api/lists/{}", $list))
            .insert_header(multipart_header())
            .set_payload(item_body($text))
            .to_request();

        let resp: serde_json::Value = test::call_and_read_body_json(&$app, req).await;
        resp
    }};
}

// ==================== Get List Tests ====================

#[actix_web::test]
async fn test_get_list_creates_empty_list() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/lists/signal").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["type"], "signal");
    assert_eq!(resp["entries"].as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn test_get_list_invalid_type() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/lists/chores").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

// ==================== Add Item Tests ====================

#[actix_web::test]
async fn test_add_item_text_only() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let resp = add_item!(app, "signal", "Deep work session");

    assert_eq!(resp["type"], "signal");
    let entries = resp["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["text"], "Deep work session");
    assert_eq!(entries[0]["completed"], false);
    assert_eq!(entries[0]["images"].as_array().unwrap().len(), 0);
    assert!(entries[0]["id"].is_string());
    assert!(entries[0]["createdAt"].is_string());
}

#[actix_web::test]
async fn test_add_item_with_image() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let png_bytes: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let mut body = Vec::new();
    text_part(&mut body, "text", "Whiteboard sketch");
    file_part(&mut body, "images", "sketch.png", "image/png", png_bytes);
    let body = close_body(body);

    let req = test::TestRequest::post()
        .uri("/api/lists/noise")
        .insert_header(multipart_header())
        .set_payload(body)
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    let entries = resp["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    let images = entries[0]["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    let image_url = images[0].as_str().unwrap();
    assert!(image_url.starts_with("/api/images/"));

    // The stored blob is served back with its content type
    let req = test::TestRequest::get().uri(image_url).to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "image/png"
    );
    let bytes = test::read_body(resp).await;
    assert_eq!(&bytes[..], png_bytes);
}

#[actix_web::test]
async fn test_add_item_invalid_type() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/lists/chores")
        .insert_header(multipart_header())
        .set_payload(item_body("nope"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_items_keep_insertion_order() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    for text in ["first", "second", "third"] {
        add_item!(app, "signal", text);
    }

    let req = test::TestRequest::get().uri("/api/lists/signal").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    let entries = resp["entries"].as_array().unwrap();
    let texts: Vec<&str> = entries
        .iter()
        .map(|entry| entry["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[actix_web::test]
async fn test_lists_are_independent() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    add_item!(app, "signal", "matters");

    let req = test::TestRequest::get().uri("/api/lists/noise").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["entries"].as_array().unwrap().len(), 0);
}

// ==================== Update Item Tests ====================

#[actix_web::test]
async fn test_update_item_mark_completed() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let resp = add_item!(app, "signal", "Finish draft");
    let item_id = resp["entries"][0]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/lists/signal/{}", item_id))
        .set_json(json!({ "completed": true }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["entries"][0]["completed"], true);
    assert_eq!(resp["entries"][0]["text"], "Finish draft");
}

#[actix_web::test]
async fn test_update_item_text() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let resp = add_item!(app, "signal", "Old text");
    let item_id = resp["entries"][0]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/lists/signal/{}", item_id))
        .set_json(json!({ "text": "New text" }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["entries"][0]["text"], "New text");
    assert_eq!(resp["entries"][0]["completed"], false);
}

#[actix_web::test]
async fn test_update_item_empty_text_is_ignored() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let resp = add_item!(app, "signal", "Keep me");
    let item_id = resp["entries"][0]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri(&format!("/api/lists/signal/{}", item_id))
        .set_json(json!({ "text": "", "completed": true }))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["entries"][0]["text"], "Keep me");
    assert_eq!(resp["entries"][0]["completed"], true);
}

#[actix_web::test]
async fn test_update_missing_item() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    // list exists but item doesn't
    let req = test::TestRequest::get().uri("/api/lists/signal").to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::put()
        .uri("/api/lists/signal/nonexistent-id")
        .set_json(json!({ "completed": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_update_item_on_unknown_list() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::put()
        .uri("/api/lists/noise/some-id")
        .set_json(json!({ "completed": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

// ==================== Delete Item Tests ====================

#[actix_web::test]
async fn test_delete_item() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    add_item!(app, "noise", "Doomscrolling");
    let resp = add_item!(app, "noise", "Inbox refresh");
    let entries = resp["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let first_id = entries[0]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::delete()
        .uri(&format!("/api/lists/noise/{}", first_id))
        .to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    let entries = resp["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["text"], "Inbox refresh");
}

#[actix_web::test]
async fn test_delete_missing_item() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/lists/noise").to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::delete()
        .uri("/api/lists/noise/nonexistent-id")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_delete_item_on_unknown_list() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::delete()
        .uri("/api/lists/signal/some-id")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

// ==================== Image Endpoint Tests ====================

#[actix_web::test]
async fn test_get_unknown_image() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state()))
            .configure(api::configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/images/nonexistent-id")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}
