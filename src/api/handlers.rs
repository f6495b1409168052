use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::engine::Engine;
use crate::model::{BookingId, BookingRequest};

use super::dto::*;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiResponse::error(STORAGE_UNAVAILABLE)),
    )
        .into_response()
}

/// `GET /get_bookings`
pub async fn list_bookings(State(state): State<AppState>) -> Response {
    match state.engine.list().await {
        Ok(bookings) => Json(bookings).into_response(),
        Err(_) => unavailable(),
    }
}

/// `POST /book`. Rejections are `200` with `success: false`; storage trouble is `503`.
pub async fn book(
    State(state): State<AppState>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            tracing::debug!("bad /book body: {rejection}");
            return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(INVALID_JSON)))
                .into_response();
        }
    };

    match state.engine.try_book(request).await {
        Ok(booking) => Json(ApiResponse::booked(booking)).into_response(),
        Err(e) if e.is_rejection() => Json(ApiResponse::error(admission_message(&e))).into_response(),
        Err(_) => unavailable(),
    }
}

/// `DELETE /cancel/{id}`. Succeeds whether or not the booking existed.
pub async fn cancel(
    State(state): State<AppState>,
    id: Result<Path<BookingId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(p) => p,
        Err(rejection) => {
            tracing::debug!("bad /cancel id: {rejection}");
            return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(INVALID_DATA)))
                .into_response();
        }
    };
    match state.engine.cancel(id).await {
        Ok(_) => Json(ApiResponse::ok()).into_response(),
        Err(_) => unavailable(),
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.engine.list().await {
        Ok(bookings) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".into(),
                bookings: Some(bookings.len()),
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded".into(),
                bookings: None,
            }),
        ),
    }
}
