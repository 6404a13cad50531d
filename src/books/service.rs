//! Book Service
//! Mission: Validate catalog writes before they reach the store

use crate::books::{
    models::Book,
    store::{BookStore, BookStoreError},
};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug)]
pub enum BookError {
    Validation(String),
    NotFound,
    Duplicate(i64),
    Persistence(String),
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::Validation(msg) => write!(f, "validation failed: {}", msg),
            BookError::NotFound => write!(f, "book not found"),
            BookError::Duplicate(id) => write!(f, "book {} already exists", id),
            BookError::Persistence(e) => write!(f, "persistence error: {}", e),
        }
    }
}

impl std::error::Error for BookError {}

impl From<BookStoreError> for BookError {
    fn from(e: BookStoreError) -> Self {
        match e {
            BookStoreError::NotFound => BookError::NotFound,
            BookStoreError::Duplicate(id) => BookError::Duplicate(id),
            BookStoreError::Backend(msg) => BookError::Persistence(msg),
        }
    }
}

fn check_id(id: i64) -> Result<(), BookError> {
    if id <= 0 {
        return Err(BookError::Validation("book ID must be positive".to_string()));
    }
    Ok(())
}

fn validate(book: &Book) -> Result<(), BookError> {
    check_id(book.id)?;
    if book.title.trim().is_empty() {
        return Err(BookError::Validation("title cannot be empty".to_string()));
    }
    if book.author.trim().is_empty() {
        return Err(BookError::Validation("author cannot be empty".to_string()));
    }
    if book.price.is_nan() || book.price <= 0.0 {
        return Err(BookError::Validation("price must be positive".to_string()));
    }
    if book.quantity <= 0 {
        return Err(BookError::Validation("quantity must be positive".to_string()));
    }
    Ok(())
}

pub struct BookService {
    store: Arc<dyn BookStore>,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, book: &Book) -> Result<(), BookError> {
        validate(book).map_err(|e| {
            warn!(book_id = book.id, error = %e, "Book rejected");
            e
        })?;
        self.store.create(book).map_err(|e| self.log_store_error(e, book.id))?;

        info!(book_id = book.id, title = %book.title, "Book created");
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Book, BookError> {
        check_id(id)?;
        self.store.get_by_id(id).map_err(|e| self.log_store_error(e, id))
    }

    pub fn list(&self) -> Result<Vec<Book>, BookError> {
        self.store.get_all().map_err(|e| self.log_store_error(e, 0))
    }

    pub fn update(&self, book: &Book) -> Result<(), BookError> {
        validate(book)?;
        self.store.update(book).map_err(|e| self.log_store_error(e, book.id))?;

        info!(book_id = book.id, "Book updated");
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<(), BookError> {
        check_id(id)?;
        self.store.delete(id).map_err(|e| self.log_store_error(e, id))?;

        info!(book_id = id, "Book deleted");
        Ok(())
    }

    fn log_store_error(&self, e: BookStoreError, id: i64) -> BookError {
        match &e {
            BookStoreError::Backend(_) => error!(book_id = id, error = %e, "Book store failure"),
            _ => warn!(book_id = id, error = %e, "Book operation failed"),
        }
        e.into()
    }
}
