//! Server Configuration
//!
//! Every option can come from the command line or the environment (a `.env` file is
//! loaded first by `main`). The signing secret has no default and must be supplied.

use crate::auth::{jwt::MAX_TTL_SECS, PasswordHasher, TokenService};
use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIN_SECRET_LEN: usize = 32;

#[derive(Parser, Debug, Clone)]
#[command(name = "bookstore")]
#[command(about = "Bookstore catalog API with token authentication and RBAC")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// SQLite database file (relative paths resolve against the working directory)
    #[arg(long, env = "DATABASE_PATH", default_value = "bookstore.db")]
    pub database_path: String,

    /// HS256 signing secret shared by access and refresh tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL_SECS", default_value_t = 900)]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL_SECS", default_value_t = 7 * 24 * 3600)]
    pub refresh_ttl_secs: u64,

    /// bcrypt work factor (4..=31)
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Admin account created at start-up when the store has no admin
    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            bail!("JWT_SECRET must be at least {} bytes", MIN_SECRET_LEN);
        }
        if self.access_ttl_secs == 0 || self.refresh_ttl_secs == 0 {
            bail!("token TTLs must be positive");
        }
        if self.access_ttl_secs > MAX_TTL_SECS || self.refresh_ttl_secs > MAX_TTL_SECS {
            bail!("token TTLs must not exceed {} seconds", MAX_TTL_SECS);
        }
        if self.refresh_ttl_secs < self.access_ttl_secs {
            bail!("refresh TTL must not be shorter than access TTL");
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31, got {}", self.bcrypt_cost);
        }
        match (&self.admin_username, &self.admin_password) {
            (Some(_), None) | (None, Some(_)) => {
                bail!("ADMIN_USERNAME and ADMIN_PASSWORD must be set together")
            }
            _ => Ok(()),
        }
    }

    pub fn token_service(&self) -> TokenService {
        TokenService::new(
            self.jwt_secret.as_bytes(),
            Duration::from_secs(self.access_ttl_secs),
            Duration::from_secs(self.refresh_ttl_secs),
        )
    }

    pub fn password_hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.bcrypt_cost)
    }

    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }

    pub fn resolved_database_path(&self) -> String {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        resolve_data_path(&self.database_path, &cwd)
    }
}

fn resolve_data_path(raw: &str, base: &Path) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return base.join("bookstore.db").to_string_lossy().to_string();
    }
    if raw == ":memory:" {
        return raw.to_string();
    }

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    base.join(p).to_string_lossy().to_string()
}
