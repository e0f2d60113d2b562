//! Failure kinds of the reservation flow and their HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// SQLSTATE codes that mean "a concurrent transaction won, try again".
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available (lock_timeout)
];

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("showtime not found or already started")]
    NotFound,

    #[error("booking not found or not cancellable")]
    BookingNotFound,

    #[error("one or more seats are invalid for this room ({found} found, {requested} requested)")]
    InvalidSeats { found: usize, requested: usize },

    #[error("some seats are out of service: {}", .seats.join(", "))]
    SeatsUnavailable { seats: Vec<String> },

    #[error("some seats are already booked: {}", .seats.join(", "))]
    SeatsAlreadyBooked { seats: Vec<String> },

    #[error("not enough room capacity ({available} available, {requested} requested)")]
    CapacityExceeded { available: i64, requested: usize },

    #[error("booking conflict, please retry")]
    BookingConflict,

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        if is_retryable(&err) {
            BookingError::BookingConflict
        } else if is_foreign_key_violation(&err) {
            BookingError::InvalidInput("referenced user or showtime does not exist".to_string())
        } else {
            BookingError::Database(err)
        }
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.kind() == sqlx::error::ErrorKind::ForeignKeyViolation)
}

fn is_retryable(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref()))
}

impl BookingError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::InvalidInput(_) => "invalid_input",
            BookingError::NotFound => "not_found",
            BookingError::BookingNotFound => "booking_not_found",
            BookingError::InvalidSeats { .. } => "invalid_seats",
            BookingError::SeatsUnavailable { .. } => "seats_unavailable",
            BookingError::SeatsAlreadyBooked { .. } => "seats_already_booked",
            BookingError::CapacityExceeded { .. } => "capacity_exceeded",
            BookingError::BookingConflict => "booking_conflict",
            BookingError::Database(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::InvalidInput(_) | BookingError::InvalidSeats { .. } => {
                StatusCode::BAD_REQUEST
            }
            BookingError::NotFound | BookingError::BookingNotFound => StatusCode::NOT_FOUND,
            BookingError::SeatsUnavailable { .. }
            | BookingError::SeatsAlreadyBooked { .. }
            | BookingError::CapacityExceeded { .. }
            | BookingError::BookingConflict => StatusCode::CONFLICT,
            BookingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::BookingConflict)
    }

    fn body(&self) -> Value {
        let mut body = json!({ "error": self.code() });
        let details = match self {
            BookingError::InvalidSeats { found, requested } => {
                json!({ "found": found, "requested": requested })
            }
            BookingError::SeatsUnavailable { seats } => json!({ "unavailable": seats }),
            BookingError::SeatsAlreadyBooked { seats } => json!({ "already_booked": seats }),
            BookingError::CapacityExceeded {
                available,
                requested,
            } => json!({ "available": available, "requested": requested }),
            BookingError::BookingConflict => json!({ "retryable": true }),
            _ => json!({}),
        };
        if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), details) {
            target.extend(extra);
        }
        // Driver details stay in the logs
        let message = match self {
            BookingError::Database(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        body["message"] = Value::String(message);
        body
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        if let BookingError::Database(ref err) = self {
            tracing::error!(error = ?err, "request failed on database error");
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}
