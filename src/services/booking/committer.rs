use sqlx::PgConnection;

use crate::error::BookingError;
use crate::models::{Booking, BookingStatus, Money};

/// A booking that passed validation and is ready to be written.
pub(super) struct NewBooking<'a> {
    pub user_id: i64,
    pub showtime_id: i64,
    pub seat_ids: &'a [i64],
    pub total_price: Money,
}

/// Writes the booking row and one `booking_seats` row per seat inside the
/// caller's transaction. The price is frozen on the row at this point.
pub(super) async fn insert_booking(
    conn: &mut PgConnection,
    new: &NewBooking<'_>,
) -> Result<Booking, BookingError> {
    let seat_count = i32::try_from(new.seat_ids.len())
        .map_err(|_| BookingError::InvalidInput("too many seats requested".to_string()))?;

    let booking = sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings (user_id, showtime_id, seat_count, total_price_cents, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, showtime_id, seat_count, total_price_cents, status, created_at
        "#,
    )
    .bind(new.user_id)
    .bind(new.showtime_id)
    .bind(seat_count)
    .bind(new.total_price)
    .bind(BookingStatus::Confirmed)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO booking_seats (booking_id, seat_id)
        SELECT $1, seat_id FROM UNNEST($2::BIGINT[]) AS seat_id
        "#,
    )
    .bind(booking.id)
    .bind(new.seat_ids)
    .execute(&mut *conn)
    .await?;

    Ok(booking)
}

/// Unit price times seat count, as charged at booking time.
pub(super) fn total_price(unit_price: Money, seat_count: usize) -> Result<Money, BookingError> {
    unit_price
        .times(seat_count)
        .ok_or_else(|| BookingError::InvalidInput("total price is out of range".to_string()))
}
