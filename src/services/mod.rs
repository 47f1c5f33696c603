pub mod availability;
pub mod calendar;
pub mod lifecycle;
pub mod loyalty;
pub mod scheduling;
pub mod slots;
