//! Omnitags - Clinic management backend
//!
//! This library provides patient, therapist and disease records behind a
//! session-authenticated JSON API.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
