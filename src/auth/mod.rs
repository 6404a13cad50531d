//! Authentication Module
//! Mission: Credential-based login, signed tokens, and role-gated access

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod user_store;

pub use jwt::{TokenError, TokenService};
pub use middleware::{AuthGate, Flow, Identity, Interceptor, Pipeline, RoleGuard};
pub use models::Role;
pub use password::PasswordHasher;
pub use service::{AuthError, AuthService};
pub use user_store::{CredentialStore, SqliteUserStore};
