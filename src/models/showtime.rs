use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::Money;

/// A showtime joined with everything a booking needs to know about it:
/// room capacity, the quality tier and its current unit price, and the film
/// and cinema it belongs to.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShowtimeDetails {
    pub id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub film_id: i64,
    pub film_title: String,
    pub room_id: i64,
    pub room_number: i32,
    pub quality: String,
    pub capacity: i32,
    pub cinema_id: i64,
    pub cinema_name: String,
    pub unit_price: Money,
}

/// Column list shared by every query that loads [`ShowtimeDetails`].
pub(crate) const SHOWTIME_DETAILS_SELECT: &str = r#"
    SELECT s.id, s.start_time, s.end_time,
           f.id AS film_id, f.title AS film_title,
           rm.id AS room_id, rm.room_number, rm.quality, rm.capacity,
           c.id AS cinema_id, c.name AS cinema_name,
           qp.price_cents AS unit_price
    FROM showtimes s
    JOIN rooms rm ON rm.id = s.room_id
    JOIN quality_prices qp ON qp.quality = rm.quality
    JOIN films f ON f.id = s.film_id
    JOIN cinemas c ON c.id = rm.cinema_id
"#;
