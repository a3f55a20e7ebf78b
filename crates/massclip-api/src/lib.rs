//! Axum HTTP API server for MassClip.
//!
//! This crate provides:
//! - Upload registration and chunked uploads
//! - Bundle catalog and checkout
//! - Purchase fulfillment from webhooks and verification
//! - Creator payout onboarding, status and earnings
//! - Firebase ID token verification
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use config::{ApiConfig, WebhookSettings};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
