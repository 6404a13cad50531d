//! Authentication API Endpoints
//! Mission: Registration, login, refresh and user management endpoints

use crate::auth::{
    middleware::Identity,
    models::{
        LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, TokenResponse,
        UpdateUserRequest, UserResponse,
    },
    service::{AuthError, AuthService},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

/// Run a service call off the async runtime; hashing and SQLite both block.
async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap_or_else(|e| {
        error!(error = %e, "Auth task failed to complete");
        Err(AuthError::Persistence("worker task aborted".to_string()))
    })
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "Rejected request body");
        ApiError::BadRequest("invalid request body".to_string())
    })
}

/// Register endpoint - POST /auth/register
pub async fn register(
    State(auth): State<Arc<AuthService>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let req = body(payload)?;
    blocking(move || auth.register(&req)).await?;

    Ok(Json(json!({ "message": "User registered successfully" })))
}

/// Login endpoint - POST /auth/login
pub async fn login(
    State(auth): State<Arc<AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let req = body(payload)?;
    let session = blocking(move || auth.login_session(&req.username, &req.password))
        .await
        .map_err(ApiError::from_login)?;

    Ok(Json(session))
}

/// Refresh endpoint - POST /auth/refresh
pub async fn refresh(
    State(auth): State<Arc<AuthService>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let req = body(payload)?;
    let token = auth
        .refresh(&req.refresh_token)
        .map_err(ApiError::from_refresh)?;

    Ok(Json(TokenResponse { token }))
}

/// Current identity - GET /auth/me (built from the token, no store lookup)
pub async fn get_current_user(identity: Identity) -> Json<Value> {
    Json(json!({
        "username": identity.username,
        "role": identity.role,
    }))
}

/// List all users - GET /users
pub async fn list_users(
    State(auth): State<Arc<AuthService>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = blocking(move || auth.list_users()).await?;
    Ok(Json(users))
}

/// Get user - GET /users/id/:id
pub async fn get_user_by_id(
    State(auth): State<Arc<AuthService>>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(move || auth.get_by_id(id)).await?;
    Ok(Json(user))
}

/// Get user - GET /users/username/:username
pub async fn get_user_by_username(
    State(auth): State<Arc<AuthService>>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(move || auth.get_by_name(&username)).await?;
    Ok(Json(user))
}

/// Update user - PUT /users/:id (Admin only)
pub async fn update_user(
    State(auth): State<Arc<AuthService>>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let req = body(payload)?;
    let user = blocking(move || {
        auth.update(id, &req)?;
        auth.get_by_id(id)
    })
    .await?;

    Ok(Json(user))
}

/// Delete user - DELETE /users/:id (Admin only)
pub async fn delete_user(
    State(auth): State<Arc<AuthService>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    blocking(move || auth.delete(id)).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Auth API errors. Messages are deliberately coarse; detail stays in the logs.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(&'static str),
    Forbidden(&'static str),
    NotFound(&'static str),
    Conflict(&'static str),
    Internal,
}

impl ApiError {
    /// Unknown username and wrong password must look identical to the client.
    pub fn from_login(e: AuthError) -> Self {
        match e {
            AuthError::UserNotFound | AuthError::InvalidCredentials => {
                ApiError::Unauthorized("invalid credentials")
            }
            other => other.into(),
        }
    }

    pub fn from_refresh(e: AuthError) -> Self {
        match e {
            AuthError::Token(_) => ApiError::Forbidden("invalid or expired token"),
            other => other.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) | AuthError::InvalidArgument(msg) => {
                ApiError::BadRequest(msg)
            }
            AuthError::DuplicateUsername(_) => ApiError::Conflict("username already exists"),
            AuthError::UserNotFound => ApiError::NotFound("user not found"),
            AuthError::InvalidCredentials => ApiError::Unauthorized("invalid credentials"),
            AuthError::Token(_) => ApiError::Unauthorized("invalid or expired token"),
            AuthError::Persistence(_) | AuthError::Hashing(_) => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.to_string()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
