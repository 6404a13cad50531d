//! Auth Service
//! Mission: Orchestrate registration, login, refresh and identity management
//!
//! This is the only component that turns a set of credentials into a token. It holds no
//! identity state of its own: every call reads from or writes to the credential store.

use crate::auth::{
    jwt::{TokenError, TokenService},
    models::{LoginResponse, RegisterRequest, Role, UpdateUserRequest, UserRecord, UserResponse},
    password::{PasswordError, PasswordHasher, MAX_PASSWORD_BYTES},
    user_store::{CredentialStore, NewUser, StoreError, UserUpdate},
};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Service-level failure taxonomy
#[derive(Debug)]
pub enum AuthError {
    Validation(String),
    InvalidArgument(String),
    DuplicateUsername(String),
    UserNotFound,
    InvalidCredentials,
    Token(TokenError),
    Persistence(String),
    Hashing(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Validation(msg) => write!(f, "validation failed: {}", msg),
            AuthError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            AuthError::DuplicateUsername(name) => write!(f, "username already exists: {}", name),
            AuthError::UserNotFound => write!(f, "user not found"),
            AuthError::InvalidCredentials => write!(f, "invalid credentials"),
            AuthError::Token(e) => write!(f, "token rejected: {}", e),
            AuthError::Persistence(e) => write!(f, "persistence error: {}", e),
            AuthError::Hashing(e) => write!(f, "hashing error: {}", e),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AuthError::UserNotFound,
            StoreError::Duplicate(name) => AuthError::DuplicateUsername(name),
            StoreError::Backend(msg) => AuthError::Persistence(msg),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        AuthError::Hashing(e.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        AuthError::Token(e)
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

fn check_password_len(password: &str) -> Result<(), String> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(format!(
            "password cannot exceed {} bytes",
            MAX_PASSWORD_BYTES
        ));
    }
    Ok(())
}

/// Parse a role label at the boundary; nothing past this point sees a raw string.
fn parse_role(value: &str) -> Result<Role, AuthError> {
    require_non_empty(value, "role")?;
    value
        .parse::<Role>()
        .map_err(|e| AuthError::Validation(e.to_string()))
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    // Verified against when the username is unknown, so both login failures cost one bcrypt run.
    decoy_hash: Option<String>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
    ) -> Self {
        let decoy_hash = hasher
            .hash("decoy-password-for-unknown-users")
            .map_err(|e| warn!(error = %e, "Failed to prepare decoy hash"))
            .ok();

        Self {
            store,
            hasher,
            tokens,
            decoy_hash,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub fn register(&self, req: &RegisterRequest) -> Result<(), AuthError> {
        let role = self.validate_registration(req).map_err(|e| {
            warn!(username = %req.username, error = %e, "Registration rejected");
            e
        })?;

        let password_hash = self.hasher.hash(&req.password).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            AuthError::from(e)
        })?;

        let username = req.username.trim();
        self.store
            .create(&NewUser {
                username: username.to_string(),
                password_hash,
                role,
            })
            .map_err(|e| {
                match &e {
                    StoreError::Duplicate(_) => {
                        warn!(username, "Registration for existing username")
                    }
                    _ => error!(username, error = %e, "Failed to create user"),
                }
                AuthError::from(e)
            })?;

        info!(username, role = %role, "User registered");
        Ok(())
    }

    fn validate_registration(&self, req: &RegisterRequest) -> Result<Role, AuthError> {
        require_non_empty(&req.username, "username")?;
        if req.password.is_empty() {
            return Err(AuthError::Validation("password cannot be empty".to_string()));
        }
        check_password_len(&req.password).map_err(AuthError::Validation)?;
        parse_role(&req.role)
    }

    /// Check credentials and return the matching record.
    ///
    /// `UserNotFound` and `InvalidCredentials` stay distinct here for logging; the HTTP
    /// layer folds both into one response.
    fn authenticate(&self, username: &str, password: &str) -> Result<UserRecord, AuthError> {
        let username = username.trim();
        let user = match self.store.get_by_username(username) {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                if let Some(decoy) = &self.decoy_hash {
                    let _ = self.hasher.verify(password, decoy);
                }
                warn!(username, "Login for unknown username");
                return Err(AuthError::UserNotFound);
            }
            Err(e) => {
                error!(username, error = %e, "Failed to fetch user for login");
                return Err(e.into());
            }
        };

        let valid = self.hasher.verify(password, &user.password_hash).map_err(|e| {
            error!(user_id = user.id, error = %e, "Stored password hash unusable");
            AuthError::from(e)
        })?;

        if !valid {
            warn!(username, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Verify credentials and issue an access token
    pub fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let user = self.authenticate(username, password)?;
        let token = self.tokens.issue(&user.username, user.role)?;

        info!(username = %user.username, role = %user.role, "Login successful");
        Ok(token)
    }

    /// Verify credentials and issue an access/refresh token pair
    pub fn login_session(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = self.authenticate(username, password)?;
        let token = self.tokens.issue(&user.username, user.role)?;
        let refresh_token = self.tokens.issue_refresh(&user.username, user.role)?;

        info!(username = %user.username, role = %user.role, "Login successful");
        Ok(LoginResponse {
            token,
            refresh_token,
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Stateless: the credential store is not consulted, so a refresh token for a user
    /// deleted after issuance keeps working until it expires.
    pub fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let claims = self.tokens.verify_refresh(refresh_token).map_err(|e| {
            warn!(error = %e, "Refresh token rejected");
            AuthError::from(e)
        })?;

        let token = self.tokens.issue(&claims.sub, claims.role)?;
        info!(username = %claims.sub, "Access token refreshed");
        Ok(token)
    }

    pub fn get_by_id(&self, id: i64) -> Result<UserResponse, AuthError> {
        if id <= 0 {
            warn!(user_id = id, "Lookup with non-positive user ID");
            return Err(AuthError::InvalidArgument(
                "user ID must be positive".to_string(),
            ));
        }

        let user = self.store.get_by_id(id).map_err(|e| {
            self.log_lookup_failure(&e, &id.to_string());
            AuthError::from(e)
        })?;
        Ok(UserResponse::from_user(&user))
    }

    pub fn get_by_name(&self, username: &str) -> Result<UserResponse, AuthError> {
        if username.trim().is_empty() {
            warn!("Lookup with empty username");
            return Err(AuthError::InvalidArgument(
                "username cannot be empty".to_string(),
            ));
        }

        let username = username.trim();
        let user = self.store.get_by_username(username).map_err(|e| {
            self.log_lookup_failure(&e, username);
            AuthError::from(e)
        })?;
        Ok(UserResponse::from_user(&user))
    }

    fn log_lookup_failure(&self, e: &StoreError, key: &str) {
        match e {
            StoreError::NotFound => warn!(key, "User not found"),
            _ => error!(key, error = %e, "Failed to fetch user"),
        }
    }

    pub fn list_users(&self) -> Result<Vec<UserResponse>, AuthError> {
        let users = self.store.get_all().map_err(|e| {
            error!(error = %e, "Failed to list users");
            AuthError::from(e)
        })?;
        Ok(users.iter().map(UserResponse::from_user).collect())
    }

    /// Update username and role; re-hash only when a new password is supplied.
    pub fn update(&self, id: i64, req: &UpdateUserRequest) -> Result<(), AuthError> {
        if id <= 0 {
            return Err(AuthError::InvalidArgument(
                "user ID must be positive".to_string(),
            ));
        }
        if req.username.trim().is_empty() {
            return Err(AuthError::InvalidArgument(
                "username cannot be empty".to_string(),
            ));
        }
        if req.role.trim().is_empty() {
            return Err(AuthError::InvalidArgument(
                "role cannot be empty".to_string(),
            ));
        }
        let role = req
            .role
            .parse::<Role>()
            .map_err(|e| AuthError::InvalidArgument(e.to_string()))?;
        if let Some(password) = req.password.as_deref() {
            check_password_len(password).map_err(AuthError::InvalidArgument)?;
        }
        let username = req.username.trim();

        let password_hash = match req.password.as_deref() {
            Some(password) if !password.is_empty() => Some(self.hasher.hash(password)?),
            _ => None,
        };
        let password_changed = password_hash.is_some();

        self.store
            .update(&UserUpdate {
                id,
                username: username.to_string(),
                role,
                password_hash,
            })
            .map_err(|e| {
                match &e {
                    StoreError::NotFound => warn!(user_id = id, "User not found for update"),
                    StoreError::Duplicate(_) => {
                        warn!(user_id = id, username, "Update to existing username")
                    }
                    StoreError::Backend(_) => error!(user_id = id, error = %e, "Failed to update user"),
                }
                AuthError::from(e)
            })?;

        info!(user_id = id, username, role = %role, password_changed, "User updated");
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<(), AuthError> {
        if id <= 0 {
            warn!(user_id = id, "Delete with non-positive user ID");
            return Err(AuthError::InvalidArgument(
                "user ID must be positive".to_string(),
            ));
        }

        self.store.delete(id).map_err(|e| {
            self.log_lookup_failure(&e, &id.to_string());
            AuthError::from(e)
        })?;

        info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Create the configured admin account if the store has no admin yet.
    /// Returns whether an account was created.
    pub fn ensure_admin(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        if self.store.count_with_role(Role::Admin)? > 0 {
            return Ok(false);
        }

        self.register(&RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::Admin.as_str().to_string(),
        })?;

        info!(username, "Bootstrap admin account created");
        Ok(true)
    }
}
