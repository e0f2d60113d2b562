use sqlx::PgConnection;

use crate::error::BookingError;
use crate::models::showtime::{ShowtimeDetails, SHOWTIME_DETAILS_SELECT};

/// Locks the showtime row for the rest of the transaction.
///
/// Every booking attempt on the same showtime queues up here; attempts on
/// other showtimes are not affected. A showtime that has already started
/// is treated exactly like a missing one.
pub(super) async fn lock_showtime(
    conn: &mut PgConnection,
    showtime_id: i64,
) -> Result<ShowtimeDetails, BookingError> {
    let sql = format!(
        "{SHOWTIME_DETAILS_SELECT} WHERE s.id = $1 AND s.start_time > NOW() FOR UPDATE OF s"
    );

    sqlx::query_as::<_, ShowtimeDetails>(&sql)
        .bind(showtime_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(BookingError::NotFound)
}
