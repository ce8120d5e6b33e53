//! Hoteluxe: hotel booking backend in Rust
//!
//! Guests search rooms, book stays and pay through a hosted checkout; owners
//! register a hotel, manage its rooms and watch bookings on a dashboard.
//! State lives in an embedded Sled document store; identity, payment, media
//! and mail are external providers behind traits.

pub mod auth;
pub mod availability;
pub mod booking;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod hotels;
pub mod mailer;
pub mod media;
pub mod models;
pub mod payment;
// REST API module: Axum HTTP handlers and webhook endpoints
pub mod rest;
pub mod storage;
pub mod telemetry;
pub mod users;
pub mod webhook;
