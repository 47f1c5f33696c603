use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, NaiveTime};

use crate::models::{hhmm, BookingStatus};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("service is not available for booking: {0}")]
    ServiceUnavailable(String),

    #[error("barber is not accepting bookings: {0}")]
    BarberUnavailable(String),

    #[error("{} on {date} is not available with this barber", hhmm::format(.time))]
    SlotUnavailable {
        barber_id: String,
        date: NaiveDate,
        time: NaiveTime,
        /// Slots still open for the same barber and date.
        available: Vec<NaiveTime>,
    },

    #[error("booking not found: {0}")]
    BookingNotFound(String),

    #[error("customer not found: {0}")]
    UserNotFound(String),

    #[error("cannot change booking status from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("unknown booking status: {0}")]
    InvalidStatusValue(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    /// Storage failures may succeed on retry; every other kind is a caller error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Storage(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::BarberUnavailable(_) => "barber_unavailable",
            AppError::SlotUnavailable { .. } => "slot_unavailable",
            AppError::BookingNotFound(_) => "booking_not_found",
            AppError::UserNotFound(_) => "user_not_found",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::InvalidStatusValue(_) => "invalid_status_value",
            AppError::Validation(_) => "validation",
            AppError::Unauthorized => "unauthorized",
            AppError::Database(_) | AppError::Storage(_) => "storage",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::ServiceUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BarberUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SlotUnavailable { .. } => StatusCode::CONFLICT,
            AppError::BookingNotFound(_) => StatusCode::NOT_FOUND,
            AppError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::InvalidStatusValue(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if self.is_retryable() {
            tracing::error!(error = %self, "storage failure");
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let AppError::SlotUnavailable { available, .. } = &self {
            let slots: Vec<String> = available.iter().map(hhmm::format).collect();
            body["available_slots"] = serde_json::json!(slots);
        }

        (status, axum::Json(body)).into_response()
    }
}
