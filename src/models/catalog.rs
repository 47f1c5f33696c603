use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Minor currency units.
    pub price: i64,
    pub duration_minutes: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Barber {
    pub id: String,
    pub name: String,
    pub is_available: bool,
    /// Raw working-hours JSON, see [`crate::models::WorkingHours`].
    pub working_hours: Option<String>,
}
