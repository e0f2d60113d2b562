use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Seat {
    pub id: i64,
    pub room_id: i64,
    pub seat_row: String,
    pub seat_number: i32,
    pub is_pmr: bool,
    pub enabled: bool,
}

impl Seat {
    /// Human readable label, row followed by number (`A1`).
    pub fn label(&self) -> String {
        seat_label(&self.seat_row, self.seat_number)
    }
}

fn seat_label(row: &str, number: i32) -> String {
    format!("{row}{number}")
}

/// One seat of a showtime's seat map.
#[derive(Debug, Clone, FromRow, Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct SeatAvailability {
    pub id: i64,
    pub seat_row: String,
    pub seat_number: i32,
    pub is_pmr: bool,
    pub enabled: bool,
    /// Not held by any pending or confirmed booking of the showtime.
    pub is_free: bool,
}
