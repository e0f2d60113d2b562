pub mod booking;
pub mod money;
pub mod seat;
pub mod showtime;

pub use booking::{BookedSeat, Booking, BookingDetails, BookingReceipt, BookingStatus};
pub use money::Money;
pub use seat::{Seat, SeatAvailability};
pub use showtime::ShowtimeDetails;
