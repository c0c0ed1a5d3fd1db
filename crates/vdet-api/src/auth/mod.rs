//! Bearer-token authentication.
//!
//! - [`password`]: Argon2id hashing and verification
//! - [`jwt`]: HS256 access tokens
//! - [`extractors`]: `AuthUser` / `AdminUser` request extractors

pub mod extractors;
pub mod jwt;
pub mod password;

pub use extractors::{AdminUser, AuthUser};
pub use jwt::{generate_access_token, validate_token, Claims};
pub use password::{hash_password, verify_password};
