//! User Storage
//! Mission: Persist identity rows (username, password hash, role) in SQLite

use crate::auth::models::{Role, UserRecord};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Credential store failures. "Not found" is kept apart from everything else.
#[derive(Debug)]
pub enum StoreError {
    NotFound,
    Duplicate(String),
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::Duplicate(name) => write!(f, "username already exists: {}", name),
            StoreError::Backend(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Row to insert. The hash must already come out of the password hasher.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Row update. `password_hash: None` leaves the stored hash untouched.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

/// Persistence boundary for identity rows
pub trait CredentialStore: Send + Sync {
    fn create(&self, user: &NewUser) -> Result<i64, StoreError>;
    fn get_by_username(&self, username: &str) -> Result<UserRecord, StoreError>;
    fn get_by_id(&self, id: i64) -> Result<UserRecord, StoreError>;
    fn get_all(&self) -> Result<Vec<UserRecord>, StoreError>;
    fn update(&self, update: &UserUpdate) -> Result<(), StoreError>;
    fn delete(&self, id: i64) -> Result<(), StoreError>;
    fn count_with_role(&self, role: Role) -> Result<usize, StoreError>;
}

/// User storage with SQLite backend
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    /// Open (or create) the store at `path` and initialize the schema
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_db()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// A stored role that does not parse is a storage fault, not something to default.
fn into_record(raw: (i64, String, String, String)) -> Result<UserRecord, StoreError> {
    let (id, username, password_hash, role) = raw;
    let role = role
        .parse::<Role>()
        .map_err(|e| StoreError::Backend(format!("user {}: {}", id, e)))?;
    Ok(UserRecord {
        id,
        username,
        password_hash,
        role,
    })
}

fn map_write_error(e: rusqlite::Error, username: &str) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::Duplicate(username.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

impl CredentialStore for SqliteUserStore {
    fn create(&self, user: &NewUser) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
            params![user.username, user.password_hash, user.role.as_str()],
        )
        .map_err(|e| map_write_error(e, &user.username))?;

        let id = conn.last_insert_rowid();
        info!(user_id = id, username = %user.username, role = %user.role, "Created user");
        Ok(id)
    }

    fn get_by_username(&self, username: &str) -> Result<UserRecord, StoreError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT id, username, password_hash, role FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;
        into_record(raw)
    }

    fn get_by_id(&self, id: i64) -> Result<UserRecord, StoreError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT id, username, password_hash, role FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;
        into_record(raw)
    }

    fn get_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, username, password_hash, role FROM users ORDER BY id")?;

        let rows = stmt
            .query_map([], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_record).collect()
    }

    fn update(&self, update: &UserUpdate) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let rows_affected = match &update.password_hash {
            Some(hash) => conn.execute(
                "UPDATE users SET username = ?1, role = ?2, password_hash = ?3 WHERE id = ?4",
                params![update.username, update.role.as_str(), hash, update.id],
            ),
            None => conn.execute(
                "UPDATE users SET username = ?1, role = ?2 WHERE id = ?3",
                params![update.username, update.role.as_str(), update.id],
            ),
        }
        .map_err(|e| map_write_error(e, &update.username))?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        debug!(
            user_id = update.id,
            password_changed = update.password_hash.is_some(),
            "Updated user"
        );
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        info!(user_id = id, "Deleted user");
        Ok(())
    }

    fn count_with_role(&self, role: Role) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![role.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
