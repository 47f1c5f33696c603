//! Appointment scheduling core for a barbershop storefront: slot catalog,
//! availability, admission control, booking lifecycle and loyalty ledger,
//! plus a thin axum surface over them.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
