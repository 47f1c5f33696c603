use chrono::Duration;

use crate::models::{BookingDetails, BookingStatus};

pub fn generate_ics(details: &BookingDetails, shop_name: &str) -> String {
    let booking = &details.booking;
    let start = booking.booking_date.and_time(booking.booking_time);
    let end = start + Duration::minutes(details.service_duration_minutes);

    let dtstart = start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = end.format("%Y%m%dT%H%M%S").to_string();
    let dtstamp = booking.updated_at.format("%Y%m%dT%H%M%SZ").to_string();
    let uid = format!("{}@barberbook", booking.id);

    let summary = format!(
        "{} with {} at {}",
        details.service_name, details.barber_name, shop_name
    );
    let description = booking.notes.as_deref().unwrap_or("No additional notes");
    let status = match booking.status {
        BookingStatus::Pending => "TENTATIVE",
        BookingStatus::Confirmed | BookingStatus::Completed => "CONFIRMED",
        BookingStatus::Cancelled => "CANCELLED",
    };

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Barberbook//Appointments//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         STATUS:{status}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}
