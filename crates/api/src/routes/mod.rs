pub mod activities;
pub mod alerts;
pub mod auth;
pub mod devices;
pub mod health;
