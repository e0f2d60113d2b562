pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod shutdown;

use axum::{
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    cache::SeatMapCache,
    config::Config,
    database::Database,
    middleware::JwtVerifier,
    services::{analytics::AnalyticsDispatcher, booking::BookingService},
};

// Shared state for every request
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub bookings: BookingService,
    pub seat_maps: SeatMapCache,
    pub jwt: JwtVerifier,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        analytics: AnalyticsDispatcher,
        seat_maps: SeatMapCache,
    ) -> Arc<Self> {
        let bookings = BookingService::new(db.clone(), analytics, seat_maps.clone());
        let jwt = JwtVerifier::new(&config.jwt.secret);
        Arc::new(Self {
            db,
            config,
            bookings,
            seat_maps,
            jwt,
        })
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Full HTTP surface: health probes plus the `/api` routes.
pub fn router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    match state.config.app.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                .allow_credentials(true),
        ),
        Err(_) => {
            tracing::warn!(
                origin = %state.config.app.cors_origin,
                "CORS_ORIGIN is not a valid header value, CORS disabled"
            );
            router
        }
    }
}
