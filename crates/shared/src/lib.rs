//! Shared utilities for the Activity Hub backend.
//!
//! This crate provides common functionality used across the other crates:
//! - Session token (JWT) signing and validation
//! - Cursor-based pagination for feed endpoints

pub mod jwt;
pub mod pagination;
