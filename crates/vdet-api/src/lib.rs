//! Axum HTTP API server for video violence detection.
//!
//! This crate provides:
//! - `POST /predict` and `GET /annotated/{filename}` over the inference core
//! - JWT bearer auth with Argon2id passwords, user administration and alerts
//! - Rate limiting, security headers and Prometheus metrics

pub mod alerts;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod upload;
pub mod users;

pub use alerts::AlertStore;
pub use config::{ApiConfig, AuthConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
pub use users::{InMemoryUserStore, StoreError, UserRecord, UserStore};
