use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::{cache::SeatMapLookup, error::BookingError, services::seatmap::load_seat_map, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/showtimes/{id}/seats", get(get_seat_map))
}

fn json_body(body: String, cache_status: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (HeaderName::from_static("x-cache"), cache_status),
        ],
        body,
    )
        .into_response()
}

// GET /api/showtimes/{id}/seats
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, BookingError> {
    let Path(showtime_id) =
        path.map_err(|rejection| BookingError::InvalidInput(rejection.body_text()))?;

    // 1. Cached rendering first
    let generation = match state.seat_maps.get(showtime_id).await {
        SeatMapLookup::Hit(cached) => return Ok(json_body(cached, "HIT")),
        SeatMapLookup::Miss { generation } => Some(generation),
        SeatMapLookup::Unavailable => None,
    };

    // 2. Miss: build it from the database
    let seat_map = load_seat_map(&state.db.pool, showtime_id)
        .await?
        .ok_or(BookingError::NotFound)?;

    // 3. Store the serialized map for the next readers
    match serde_json::to_string(&seat_map) {
        Ok(body) => {
            if let Some(generation) = generation {
                state.seat_maps.put(showtime_id, generation, &body).await;
            }
            Ok(json_body(body, "MISS"))
        }
        Err(err) => {
            tracing::error!(showtime_id, error = %err, "failed to serialize seat map");
            Ok(Json(seat_map).into_response())
        }
    }
}
