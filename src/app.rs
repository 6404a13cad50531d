//! Application state and router assembly.
//!
//! Three route groups: public, authenticated (auth gate), and admin (auth gate then
//! role guard). Each protected group carries its own explicit interceptor pipeline.

use crate::{
    auth::{
        api as auth_api,
        middleware::{run_pipeline, AuthGate, Pipeline, RoleGuard},
        AuthService, CredentialStore, PasswordHasher, Role, TokenService,
    },
    books::{api as books_api, BookService, BookStore},
    middleware::request_logging,
};
use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub books: Arc<BookService>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        books: Arc<dyn BookStore>,
        tokens: Arc<TokenService>,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            auth: Arc::new(AuthService::new(users, hasher, tokens)),
            books: Arc::new(BookService::new(books)),
        }
    }

    pub fn tokens(&self) -> Arc<TokenService> {
        self.auth.tokens().clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for Arc<BookService> {
    fn from_ref(state: &AppState) -> Self {
        state.books.clone()
    }
}

/// Auth gate only
pub fn authenticated(tokens: Arc<TokenService>) -> Pipeline {
    Pipeline::new().then(AuthGate::new(tokens))
}

/// Auth gate, then the admin role guard
pub fn admin_only(tokens: Arc<TokenService>) -> Pipeline {
    authenticated(tokens).then(RoleGuard::require(Role::Admin))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    let tokens = state.tokens();

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth_api::register))
        .route("/auth/login", post(auth_api::login))
        .route("/auth/refresh", post(auth_api::refresh));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth_api::get_current_user))
        .route("/users", get(auth_api::list_users))
        .route("/users/id/:id", get(auth_api::get_user_by_id))
        .route("/users/username/:username", get(auth_api::get_user_by_username))
        .route("/books", get(books_api::list_books))
        .route("/books/:id", get(books_api::get_book))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(authenticated(tokens.clone())),
            run_pipeline,
        ));

    let admin_routes = Router::new()
        .route(
            "/users/:id",
            put(auth_api::update_user).delete(auth_api::delete_user),
        )
        .route("/admin/books", post(books_api::create_book))
        .route(
            "/admin/books/:id",
            put(books_api::update_book).delete(books_api::delete_book),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::new(admin_only(tokens)),
            run_pipeline,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
