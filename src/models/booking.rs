use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};

use super::Money;

/// Lifecycle of a booking.
///
/// Bookings are created `confirmed`. The owner may move `confirmed` to
/// `cancelled` before the showtime starts; `used` is set outside this
/// service. `pending` is reserved for deferred payment flows and, like
/// `confirmed`, keeps its seats taken. `cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Used,
}

/// Row of the `bookings` table.
#[derive(Debug, Clone, FromRow)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub showtime_id: i64,
    pub seat_count: i32,
    pub total_price_cents: Money,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// What a successful reservation returns to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReceipt {
    pub id: i64,
    pub showtime_id: i64,
    pub total_price: Money,
    pub seat_count: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Booking> for BookingReceipt {
    fn from(booking: Booking) -> Self {
        BookingReceipt {
            id: booking.id,
            showtime_id: booking.showtime_id,
            total_price: booking.total_price_cents,
            seat_count: booking.seat_count,
            status: booking.status,
            created_at: booking.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedSeat {
    pub seat_id: i64,
    pub seat_row: String,
    pub seat_number: i32,
}

/// A booking as shown to its owner, with showtime context and seats.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BookingDetails {
    pub id: i64,
    pub total_price: Money,
    pub seat_count: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub showtime_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub film_id: i64,
    pub film_title: String,
    pub poster_url: Option<String>,
    pub room_number: i32,
    pub quality: String,
    pub cinema_name: String,
    pub city: String,
    pub seats: Json<Vec<BookedSeat>>,
}
