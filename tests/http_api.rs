use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use roomsync::api::dto::{ApiResponse, HealthResponse};
use roomsync::api::router;
use roomsync::engine::Engine;
use roomsync::model::Booking;
use roomsync::store::{InMemoryStore, ReservationStore, WalStore};

// ── Test infrastructure ──────────────────────────────────────

fn app_with(store: Arc<dyn ReservationStore>) -> (Router, Arc<Engine>) {
    let engine = Arc::new(Engine::new(store, Duration::from_secs(5)));
    (router(engine.clone()), engine)
}

fn app() -> Router {
    app_with(Arc::new(InMemoryStore::new())).0
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn booking_json(room: &str, date: &str, start: &str, end: &str) -> Value {
    json!({
        "room": room,
        "title": "Quarterly review",
        "date": date,
        "start": start,
        "end": end,
        "bookedBy": "morgan",
    })
}

async fn book(app: &Router, body: Value) -> (StatusCode, ApiResponse) {
    let (status, value) = send(app, Method::POST, "/book", Some(body)).await;
    (status, serde_json::from_value(value).unwrap())
}

async fn list(app: &Router) -> Vec<Booking> {
    let (status, value) = send(app, Method::GET, "/get_bookings", None).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_value(value).unwrap()
}

// ── Booking ──────────────────────────────────────────────────

#[tokio::test]
async fn book_returns_stored_booking() {
    let app = app();
    let (status, resp) = book(&app, booking_json("R1", "2024-01-01", "09:00", "10:00")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(resp.success);
    let booking = resp.booking.expect("booking in response");
    assert_eq!(booking.room, "R1");
    assert_eq!(booking.booked_by, "morgan");

    let (_, raw) = send(&app, Method::GET, "/get_bookings", None).await;
    let first = &raw.as_array().unwrap()[0];
    for field in ["id", "room", "title", "date", "start", "end", "bookedBy"] {
        assert!(first.get(field).is_some(), "missing {field} in listing");
    }
    assert_eq!(first["id"], booking.id);
}

#[tokio::test]
async fn touching_windows_both_succeed() {
    let app = app();
    let (_, a) = book(&app, booking_json("R1", "2024-01-01", "09:00", "10:00")).await;
    let (_, b) = book(&app, booking_json("R1", "2024-01-01", "10:00", "11:00")).await;
    assert!(a.success && b.success);
    assert_eq!(list(&app).await.len(), 2);
}

#[tokio::test]
async fn overlap_reports_clash() {
    let app = app();
    book(&app, booking_json("R1", "2024-01-01", "09:00", "10:00")).await;

    let (status, resp) = book(&app, booking_json("R1", "2024-01-01", "09:30", "09:45")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp, ApiResponse::error("Clash detected"));

    let (_, other_room) = book(&app, booking_json("R2", "2024-01-01", "09:30", "09:45")).await;
    let (_, other_date) = book(&app, booking_json("R1", "2024-01-02", "09:30", "09:45")).await;
    assert!(other_room.success);
    assert!(other_date.success);
    assert_eq!(list(&app).await.len(), 3);
}

#[tokio::test]
async fn missing_fields_report_missing_data() {
    let app = app();
    for field in ["room", "title", "date", "start", "end", "bookedBy"] {
        let mut body = booking_json("R1", "2024-01-01", "09:00", "10:00");
        body.as_object_mut().unwrap().remove(field);
        let (status, resp) = book(&app, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp, ApiResponse::error("Missing data"), "without {field}");
    }

    let mut blank = booking_json("R1", "2024-01-01", "09:00", "10:00");
    blank["title"] = json!("");
    let (_, resp) = book(&app, blank).await;
    assert_eq!(resp.error.as_deref(), Some("Missing data"));

    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn malformed_times_report_invalid_data() {
    let app = app();
    let (status, resp) = book(&app, booking_json("R1", "2024-01-01", "half nine", "10:00")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp, ApiResponse::error("Invalid data"));

    let (_, resp) = book(&app, booking_json("R1", "2024-01-01", "11:00", "10:00")).await;
    assert_eq!(resp, ApiResponse::error("Invalid data"));
    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn non_json_body_is_bad_request() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/book")
        .header("content-type", "application/json")
        .body(Body::from("room=R1"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let resp: ApiResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(resp, ApiResponse::error("Invalid JSON"));
}

// ── Listing ──────────────────────────────────────────────────

#[tokio::test]
async fn listing_ordered_by_date_and_start() {
    let app = app();
    book(&app, booking_json("R1", "2024-02-01", "09:00", "10:00")).await;
    book(&app, booking_json("R2", "2024-01-15", "13:00", "14:00")).await;
    book(&app, booking_json("R3", "2024-01-15", "8:30", "9:00")).await;

    let order: Vec<(String, String)> = list(&app)
        .await
        .into_iter()
        .map(|b| (b.date, b.start))
        .collect();
    assert_eq!(
        order,
        vec![
            ("2024-01-15".to_string(), "08:30".to_string()),
            ("2024-01-15".to_string(), "13:00".to_string()),
            ("2024-02-01".to_string(), "09:00".to_string()),
        ]
    );
}

// ── Cancellation ─────────────────────────────────────────────

#[tokio::test]
async fn cancel_always_succeeds() {
    let app = app();
    let (_, resp) = book(&app, booking_json("R1", "2024-01-01", "09:00", "10:00")).await;
    let id = resp.booking.unwrap().id;

    for _ in 0..2 {
        let (status, value) = send(&app, Method::DELETE, &format!("/cancel/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, json!({ "success": true }));
    }
    let (status, value) = send(&app, Method::DELETE, "/cancel/123456", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "success": true }));

    assert!(list(&app).await.is_empty());
    let (_, again) = book(&app, booking_json("R1", "2024-01-01", "09:00", "10:00")).await;
    assert!(again.success);
}

#[tokio::test]
async fn non_numeric_cancel_id_is_bad_request() {
    let app = app();
    book(&app, booking_json("R1", "2024-01-01", "09:00", "10:00")).await;

    let (status, value) = send(&app, Method::DELETE, "/cancel/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value, json!({ "success": false, "error": "Invalid data" }));
    assert_eq!(list(&app).await.len(), 1);
}

// ── Storage ──────────────────────────────────────────────────

#[tokio::test]
async fn closed_store_is_503_not_clash() {
    let (app, engine) = app_with(Arc::new(InMemoryStore::new()));
    engine.close().await.unwrap();

    let (status, resp) = book(&app, booking_json("R1", "2024-01-01", "09:00", "10:00")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp, ApiResponse::error("Storage unavailable"));

    let (status, _) = send(&app, Method::GET, "/get_bookings", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = send(&app, Method::DELETE, "/cancel/1", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, value) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: HealthResponse = serde_json::from_value(value).unwrap();
    assert_eq!(health.status, "degraded");
}

#[tokio::test]
async fn health_counts_live_bookings() {
    let app = app();
    book(&app, booking_json("R1", "2024-01-01", "09:00", "10:00")).await;
    let (status, value) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "status": "ok", "bookings": 1 }));
}

#[tokio::test]
async fn bookings_survive_restart() {
    let dir = std::env::temp_dir().join(format!("roomsync_http_restart_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bookings.wal");
    let _ = std::fs::remove_file(&path);

    let first_id = {
        let (app, engine) = app_with(Arc::new(WalStore::open(&path).unwrap()));
        let (_, a) = book(&app, booking_json("R1", "2024-01-01", "09:00", "10:00")).await;
        let (_, b) = book(&app, booking_json("R1", "2024-01-01", "10:00", "11:00")).await;
        send(&app, Method::DELETE, &format!("/cancel/{}", b.booking.unwrap().id), None).await;
        engine.close().await.unwrap();
        a.booking.unwrap().id
    };

    let (app, engine) = app_with(Arc::new(WalStore::open(&path).unwrap()));
    let live = list(&app).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, first_id);

    // Clash checks see replayed bookings.
    let (_, resp) = book(&app, booking_json("R1", "2024-01-01", "09:15", "09:30")).await;
    assert_eq!(resp.error.as_deref(), Some("Clash detected"));
    let (_, resp) = book(&app, booking_json("R1", "2024-01-01", "10:00", "11:00")).await;
    assert!(resp.booking.unwrap().id > first_id + 1);

    engine.close().await.unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_admit_one_per_window() {
    let app = app();
    let requests = (0..20).map(|i| {
        let app = app.clone();
        let booked_by = format!("user{i}");
        async move {
            let mut body = booking_json("Main Hall", "2024-06-01", "14:00", "15:00");
            body["bookedBy"] = json!(booked_by);
            book(&app, body).await.1
        }
    });
    let results = futures::future::join_all(requests).await;
    assert_eq!(results.iter().filter(|r| r.success).count(), 1);
    assert!(results
        .iter()
        .filter(|r| !r.success)
        .all(|r| r.error.as_deref() == Some("Clash detected")));
    assert_eq!(list(&app).await.len(), 1);
}
