use sqlx::{PgConnection, PgExecutor};
use std::collections::HashSet;

use crate::error::BookingError;
use crate::models::{Seat, ShowtimeDetails};

/// Seat ids of one booking request, checked for shape before any
/// transaction is opened.
///
/// Duplicates are kept on purpose: a duplicated id locks a single row and
/// the request then fails the found-vs-requested check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatSelection {
    ids: Vec<i64>,
}

impl SeatSelection {
    pub fn new(ids: &[i64]) -> Result<Self, BookingError> {
        if ids.is_empty() {
            return Err(BookingError::InvalidInput(
                "select at least one seat".to_string(),
            ));
        }
        if ids.iter().any(|&id| id <= 0) {
            return Err(BookingError::InvalidInput(
                "seat ids must be positive integers".to_string(),
            ));
        }
        Ok(Self { ids: ids.to_vec() })
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Locks the requested seats and runs every availability check against the
/// locked rows. Nothing is written; on error the caller rolls back.
pub(super) async fn validate_seats(
    conn: &mut PgConnection,
    showtime: &ShowtimeDetails,
    selection: &SeatSelection,
) -> Result<Vec<Seat>, BookingError> {
    let locked = lock_room_seats(&mut *conn, showtime.room_id, selection.ids()).await?;
    ensure_all_found(&locked, selection.len())?;
    ensure_enabled(&locked)?;

    let taken = taken_seat_ids(&mut *conn, showtime.id, selection.ids()).await?;
    ensure_not_taken(&locked, &taken)?;

    let booked = booked_seat_count(&mut *conn, showtime.id).await?;
    ensure_capacity(showtime.capacity, booked, selection.len())?;

    Ok(locked)
}

// Ascending id order keeps lock acquisition consistent across transactions
async fn lock_room_seats(
    conn: &mut PgConnection,
    room_id: i64,
    seat_ids: &[i64],
) -> Result<Vec<Seat>, sqlx::Error> {
    sqlx::query_as::<_, Seat>(
        r#"
        SELECT id, room_id, seat_row, seat_number, is_pmr, enabled
        FROM seats
        WHERE id = ANY($1) AND room_id = $2
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(seat_ids)
    .bind(room_id)
    .fetch_all(conn)
    .await
}

async fn taken_seat_ids(
    conn: &mut PgConnection,
    showtime_id: i64,
    seat_ids: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT bs.seat_id
        FROM booking_seats bs
        JOIN bookings b ON b.id = bs.booking_id
        WHERE b.showtime_id = $1
          AND b.status IN ('confirmed', 'pending')
          AND bs.seat_id = ANY($2)
        "#,
    )
    .bind(showtime_id)
    .bind(seat_ids)
    .fetch_all(conn)
    .await
}

/// Seats held by pending or confirmed bookings of a showtime.
pub(crate) async fn booked_seat_count<'e, E>(executor: E, showtime_id: i64) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(seat_count), 0)::BIGINT
        FROM bookings
        WHERE showtime_id = $1 AND status IN ('confirmed', 'pending')
        "#,
    )
    .bind(showtime_id)
    .fetch_one(executor)
    .await
}

fn ensure_all_found(locked: &[Seat], requested: usize) -> Result<(), BookingError> {
    if locked.len() != requested {
        return Err(BookingError::InvalidSeats {
            found: locked.len(),
            requested,
        });
    }
    Ok(())
}

fn ensure_enabled(locked: &[Seat]) -> Result<(), BookingError> {
    let disabled: Vec<String> = locked
        .iter()
        .filter(|seat| !seat.enabled)
        .map(Seat::label)
        .collect();
    if !disabled.is_empty() {
        return Err(BookingError::SeatsUnavailable { seats: disabled });
    }
    Ok(())
}

fn ensure_not_taken(locked: &[Seat], taken: &[i64]) -> Result<(), BookingError> {
    let taken: HashSet<i64> = taken.iter().copied().collect();
    let conflicting: Vec<String> = locked
        .iter()
        .filter(|seat| taken.contains(&seat.id))
        .map(Seat::label)
        .collect();
    if !conflicting.is_empty() {
        return Err(BookingError::SeatsAlreadyBooked { seats: conflicting });
    }
    Ok(())
}

fn ensure_capacity(capacity: i32, booked: i64, requested: usize) -> Result<(), BookingError> {
    let capacity = i64::from(capacity);
    let wanted = i64::try_from(requested).unwrap_or(i64::MAX);
    if booked.saturating_add(wanted) > capacity {
        return Err(BookingError::CapacityExceeded {
            available: (capacity - booked).max(0),
            requested,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seat(id: i64, row: &str, number: i32, enabled: bool) -> Seat {
        Seat {
            id,
            room_id: 1,
            seat_row: row.to_string(),
            seat_number: number,
            is_pmr: false,
            enabled,
        }
    }

    #[test]
    fn empty_selection_is_invalid_input() {
        assert!(matches!(
            SeatSelection::new(&[]),
            Err(BookingError::InvalidInput(_))
        ));
    }

    #[test]
    fn non_positive_ids_are_invalid_input() {
        assert!(matches!(
            SeatSelection::new(&[3, 0]),
            Err(BookingError::InvalidInput(_))
        ));
        assert!(matches!(
            SeatSelection::new(&[-4]),
            Err(BookingError::InvalidInput(_))
        ));
    }

    #[test]
    fn duplicates_survive_selection_and_fail_the_count_check() {
        let selection = SeatSelection::new(&[5, 5]).unwrap();
        assert_eq!(selection.len(), 2);

        let locked = vec![seat(5, "A", 1, true)];
        match ensure_all_found(&locked, selection.len()) {
            Err(BookingError::InvalidSeats { found, requested }) => {
                assert_eq!((found, requested), (1, 2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn foreign_seat_reports_zero_found() {
        match ensure_all_found(&[], 1) {
            Err(BookingError::InvalidSeats { found, requested }) => {
                assert_eq!((found, requested), (0, 1));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn disabled_seats_are_reported_by_label() {
        let locked = vec![seat(1, "A", 1, false), seat(2, "A", 2, true)];
        match ensure_enabled(&locked) {
            Err(BookingError::SeatsUnavailable { seats }) => assert_eq!(seats, vec!["A1"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn taken_seats_are_reported_by_label() {
        let locked = vec![seat(1, "A", 1, true), seat(2, "B", 7, true)];
        match ensure_not_taken(&locked, &[2]) {
            Err(BookingError::SeatsAlreadyBooked { seats }) => assert_eq!(seats, vec!["B7"]),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(ensure_not_taken(&locked, &[]).is_ok());
    }

    #[test]
    fn filling_the_room_exactly_is_allowed() {
        assert!(ensure_capacity(2, 0, 2).is_ok());
        assert!(ensure_capacity(2, 1, 1).is_ok());
    }

    #[test]
    fn overflowing_capacity_reports_what_is_left() {
        match ensure_capacity(10, 9, 3) {
            Err(BookingError::CapacityExceeded {
                available,
                requested,
            }) => assert_eq!((available, requested), (1, 3)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn capacity_check_never_lets_the_total_exceed_capacity(
            capacity in 0i32..500,
            booked in 0i64..600,
            requested in 1usize..50,
        ) {
            let accepted = ensure_capacity(capacity, booked, requested).is_ok();
            prop_assert_eq!(accepted, booked + requested as i64 <= i64::from(capacity));
        }
    }
}
