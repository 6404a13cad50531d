//! Book API Endpoints

use crate::books::{
    models::{Book, BookUpdate},
    service::{BookError, BookService},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

async fn blocking<T, F>(f: F) -> Result<T, BookError>
where
    F: FnOnce() -> Result<T, BookError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap_or_else(|e| {
        error!(error = %e, "Book task failed to complete");
        Err(BookError::Persistence("worker task aborted".to_string()))
    })
}

/// GET /books
pub async fn list_books(
    State(books): State<Arc<BookService>>,
) -> Result<Json<Vec<Book>>, BookError> {
    Ok(Json(blocking(move || books.list()).await?))
}

/// GET /books/:id
pub async fn get_book(
    State(books): State<Arc<BookService>>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, BookError> {
    Ok(Json(blocking(move || books.get(id)).await?))
}

/// POST /admin/books (Admin only)
pub async fn create_book(
    State(books): State<Arc<BookService>>,
    payload: Result<Json<Book>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), BookError> {
    let Json(book) = payload.map_err(|_| BookError::Validation("invalid request body".into()))?;
    let created = book.clone();
    blocking(move || books.create(&book)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /admin/books/:id (Admin only)
pub async fn update_book(
    State(books): State<Arc<BookService>>,
    Path(id): Path<i64>,
    payload: Result<Json<BookUpdate>, JsonRejection>,
) -> Result<Json<Book>, BookError> {
    let Json(update) =
        payload.map_err(|_| BookError::Validation("invalid request body".into()))?;
    let book = update.into_book(id);
    let updated = book.clone();
    blocking(move || books.update(&book)).await?;
    Ok(Json(updated))
}

/// DELETE /admin/books/:id (Admin only)
pub async fn delete_book(
    State(books): State<Arc<BookService>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, BookError> {
    blocking(move || books.delete(id)).await?;
    Ok(Json(json!({ "message": "Book deleted successfully" })))
}

impl IntoResponse for BookError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            BookError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            BookError::NotFound => (StatusCode::NOT_FOUND, "book not found".to_string()),
            BookError::Duplicate(_) => (StatusCode::CONFLICT, "book already exists".to_string()),
            BookError::Persistence(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
