pub mod analytics;
pub mod booking;
pub mod seatmap;
