//! Domain layer for the Activity Hub backend.
//!
//! This crate contains:
//! - Domain models (Activity, Participation, Alert, Session)
//! - The participation lifecycle and alert generation services
//! - Store traits with in-memory implementations
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;
pub mod stores;
