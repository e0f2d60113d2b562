use serde::Serialize;
use sqlx::PgPool;

use crate::models::{
    showtime::{ShowtimeDetails, SHOWTIME_DETAILS_SELECT},
    SeatAvailability,
};
use crate::services::booking::validator::booked_seat_count;

/// Seat map of a showtime: header plus every seat of the room with its
/// current availability. Read without locks, so it is advisory only.
#[derive(Debug, Clone, Serialize)]
pub struct SeatMap {
    pub showtime: ShowtimeDetails,
    pub available_seats: i64,
    pub seats: Vec<SeatAvailability>,
}

pub async fn load_seat_map(pool: &PgPool, showtime_id: i64) -> Result<Option<SeatMap>, sqlx::Error> {
    let sql = format!("{SHOWTIME_DETAILS_SELECT} WHERE s.id = $1");
    let Some(showtime) = sqlx::query_as::<_, ShowtimeDetails>(&sql)
        .bind(showtime_id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let seats = sqlx::query_as::<_, SeatAvailability>(
        r#"
        SELECT st.id, st.seat_row, st.seat_number, st.is_pmr, st.enabled,
               NOT EXISTS (
                   SELECT 1
                   FROM booking_seats bs
                   JOIN bookings b ON b.id = bs.booking_id
                   WHERE bs.seat_id = st.id
                     AND b.showtime_id = $1
                     AND b.status IN ('confirmed', 'pending')
               ) AS is_free
        FROM seats st
        WHERE st.room_id = $2
        ORDER BY st.seat_row, st.seat_number
        "#,
    )
    .bind(showtime.id)
    .bind(showtime.room_id)
    .fetch_all(pool)
    .await?;

    let booked = booked_seat_count(pool, showtime.id).await?;
    let available_seats = (i64::from(showtime.capacity) - booked).max(0);

    Ok(Some(SeatMap {
        showtime,
        available_seats,
        seats,
    }))
}
