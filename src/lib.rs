//! Bookstore Backend Library
//!
//! Catalog service (users, books) over HTTP. The auth module carries the security
//! logic: password hashing, signed tokens, the auth gate and the role guard.

pub mod app;
pub mod auth;
pub mod books;
pub mod config;
pub mod middleware;

pub use app::{router, AppState};
pub use config::Config;
