//! Seat reservation transaction.
//!
//! `create_booking` runs locate -> validate -> commit inside one
//! `SERIALIZABLE` transaction:
//!
//! 1. the showtime row is locked (`FOR UPDATE`), serializing bookings per showtime;
//! 2. the requested seat rows are locked and checked (room membership, enabled,
//!    not already taken, room capacity);
//! 3. the booking and its seat rows are inserted and the transaction commits.
//!
//! The transaction handle is owned by the call. Every early return rolls it
//! back explicitly and a dropped handle rolls back on its own, so the
//! connection always goes back to the pool clean. A serialization failure
//! surfaces as [`BookingError::BookingConflict`] and is left to the client
//! to retry.

mod committer;
mod locator;
pub mod validator;

use sqlx::PgConnection;
use tracing::{info, warn};

pub use validator::SeatSelection;

use crate::{
    cache::SeatMapCache,
    database::Database,
    error::BookingError,
    models::{Booking, BookingDetails, BookingReceipt, BookingStatus, ShowtimeDetails},
    services::analytics::{AnalyticsDispatcher, BookingStat},
};
use committer::NewBooking;

#[derive(Clone)]
pub struct BookingService {
    db: Database,
    analytics: AnalyticsDispatcher,
    seat_maps: SeatMapCache,
}

impl BookingService {
    pub fn new(db: Database, analytics: AnalyticsDispatcher, seat_maps: SeatMapCache) -> Self {
        Self {
            db,
            analytics,
            seat_maps,
        }
    }

    /// Reserves `seat_ids` for `user_id` on `showtime_id`.
    #[tracing::instrument(name = "create_booking", skip(self, seat_ids), fields(seats = seat_ids.len()))]
    pub async fn create_booking(
        &self,
        user_id: i64,
        showtime_id: i64,
        seat_ids: &[i64],
    ) -> Result<BookingReceipt, BookingError> {
        let selection = SeatSelection::new(seat_ids)?;

        let mut tx = self.db.pool.begin().await?;

        let (showtime, booking) =
            match reserve(&mut tx, user_id, showtime_id, &selection).await {
                Ok(reserved) => reserved,
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "rollback after rejected booking failed");
                    }
                    info!(reason = err.code(), retryable = err.is_retryable(), "booking rejected");
                    return Err(err);
                }
            };

        // A serialization failure can still surface here
        if let Err(err) = tx.commit().await {
            let err = BookingError::from(err);
            warn!(reason = err.code(), "booking commit failed");
            return Err(err);
        }

        info!(
            booking_id = booking.id,
            total_price = %booking.total_price_cents,
            "booking confirmed"
        );

        self.analytics
            .record_booking_stat(BookingStat::new(&showtime, &booking));
        self.seat_maps.invalidate_in_background(showtime_id);

        Ok(booking.into())
    }

    /// Cancels a confirmed booking owned by `user_id` whose showtime has not
    /// started yet.
    pub async fn cancel_booking(
        &self,
        user_id: i64,
        booking_id: i64,
    ) -> Result<BookingReceipt, BookingError> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings b
            SET status = $3
            FROM showtimes s
            WHERE b.id = $1
              AND b.user_id = $2
              AND b.status = $4
              AND s.id = b.showtime_id
              AND s.start_time > NOW()
            RETURNING b.id, b.user_id, b.showtime_id, b.seat_count,
                      b.total_price_cents, b.status, b.created_at
            "#,
        )
        .bind(booking_id)
        .bind(user_id)
        .bind(BookingStatus::Cancelled)
        .bind(BookingStatus::Confirmed)
        .fetch_optional(&self.db.pool)
        .await?
        .ok_or(BookingError::BookingNotFound)?;

        info!(booking_id, user_id, "booking cancelled");
        self.seat_maps.invalidate_in_background(booking.showtime_id);

        Ok(booking.into())
    }

    /// Bookings of `user_id`, latest showtime first.
    pub async fn list_user_bookings(&self, user_id: i64) -> Result<Vec<BookingDetails>, BookingError> {
        let sql = booking_details_query("b.user_id = $1");
        let bookings = sqlx::query_as::<_, BookingDetails>(&sql)
            .bind(user_id)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(bookings)
    }

    /// One booking, visible to its owner only.
    pub async fn get_user_booking(
        &self,
        user_id: i64,
        booking_id: i64,
    ) -> Result<BookingDetails, BookingError> {
        let sql = booking_details_query("b.id = $1 AND b.user_id = $2");
        sqlx::query_as::<_, BookingDetails>(&sql)
            .bind(booking_id)
            .bind(user_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(BookingError::BookingNotFound)
    }
}

async fn reserve(
    conn: &mut PgConnection,
    user_id: i64,
    showtime_id: i64,
    selection: &SeatSelection,
) -> Result<(ShowtimeDetails, Booking), BookingError> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *conn)
        .await?;

    let showtime = locator::lock_showtime(&mut *conn, showtime_id).await?;
    validator::validate_seats(&mut *conn, &showtime, selection).await?;

    let total_price = committer::total_price(showtime.unit_price, selection.len())?;
    let booking = committer::insert_booking(
        &mut *conn,
        &NewBooking {
            user_id,
            showtime_id: showtime.id,
            seat_ids: selection.ids(),
            total_price,
        },
    )
    .await?;

    Ok((showtime, booking))
}

fn booking_details_query(filter: &str) -> String {
    format!(
        r#"
        SELECT b.id, b.total_price_cents AS total_price, b.seat_count, b.status, b.created_at,
               s.id AS showtime_id, s.start_time, s.end_time,
               f.id AS film_id, f.title AS film_title, f.poster_url,
               rm.room_number, rm.quality,
               c.name AS cinema_name, c.city,
               COALESCE(
                   jsonb_agg(
                       jsonb_build_object(
                           'seat_id', st.id,
                           'seat_row', st.seat_row,
                           'seat_number', st.seat_number
                       )
                       ORDER BY st.seat_row, st.seat_number
                   ) FILTER (WHERE st.id IS NOT NULL),
                   '[]'::jsonb
               ) AS seats
        FROM bookings b
        JOIN showtimes s ON s.id = b.showtime_id
        JOIN films f ON f.id = s.film_id
        JOIN rooms rm ON rm.id = s.room_id
        JOIN cinemas c ON c.id = rm.cinema_id
        LEFT JOIN booking_seats bs ON bs.booking_id = b.id
        LEFT JOIN seats st ON st.id = bs.seat_id
        WHERE {filter}
        GROUP BY b.id, s.id, f.id, rm.id, c.id
        ORDER BY s.start_time DESC, b.id DESC
        "#
    )
}
