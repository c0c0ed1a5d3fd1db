//! Request handlers.

pub mod admin;
pub mod alerts;
pub mod auth;
pub mod health;
pub mod predict;

pub use admin::*;
pub use alerts::*;
pub use auth::*;
pub use health::*;
pub use predict::*;
