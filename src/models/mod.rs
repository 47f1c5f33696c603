pub mod booking;
pub mod catalog;
pub mod hhmm;
pub mod loyalty;
pub mod user;
pub mod working_hours;

pub use booking::{
    Booking, BookingDetails, BookingFilter, BookingStatus, BookingUpdate, NewBooking,
    PaymentStatus,
};
pub use catalog::{Barber, Service};
pub use loyalty::{LoyaltySummary, LoyaltyTransaction, ReconcileReport, TransactionType};
pub use user::User;
pub use working_hours::WorkingHours;
