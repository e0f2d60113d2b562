use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::{Validate, ValidationError};

use crate::{error::BookingError, middleware::AuthUser, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/me", get(get_my_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", put(cancel_booking))
}

/* ---------- helpers ---------- */

fn booking_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, BookingError> {
    let Path(id) = path.map_err(|rejection| BookingError::InvalidInput(rejection.body_text()))?;
    if id <= 0 {
        return Err(BookingError::InvalidInput(
            "booking id must be a positive integer".to_string(),
        ));
    }
    Ok(id)
}

fn validate_seat_ids(seat_ids: &[i64]) -> Result<(), ValidationError> {
    if seat_ids.iter().any(|&id| id <= 0) {
        return Err(ValidationError::new("positive_seat_ids")
            .with_message("seat ids must be positive integers".into()));
    }
    Ok(())
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(range(min = 1, message = "showtime_id must be a positive integer"))]
    pub showtime_id: i64,
    #[validate(
        length(min = 1, message = "select at least one seat"),
        custom(function = "validate_seat_ids")
    )]
    pub seat_ids: Vec<i64>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let Json(req) = payload.map_err(|rejection| BookingError::InvalidInput(rejection.body_text()))?;
    req.validate()
        .map_err(|errors| BookingError::InvalidInput(errors.to_string()))?;

    let booking = state
        .bookings
        .create_booking(user.user_id, req.showtime_id, &req.seat_ids)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Booking confirmed", "booking": booking })),
    ))
}

// GET /api/bookings/me
async fn get_my_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, BookingError> {
    let bookings = state.bookings.list_user_bookings(user.user_id).await?;
    Ok(Json(bookings))
}

// GET /api/bookings/{id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let id = booking_id(path)?;
    let booking = state.bookings.get_user_booking(user.user_id, id).await?;
    Ok(Json(booking))
}

// PUT /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let id = booking_id(path)?;
    let booking = state.bookings.cancel_booking(user.user_id, id).await?;
    Ok(Json(json!({ "message": "Booking cancelled", "booking": booking })))
}
