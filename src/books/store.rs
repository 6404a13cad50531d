//! Book Storage
//! Mission: Persist catalog rows in SQLite

use crate::books::models::Book;
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub enum BookStoreError {
    NotFound,
    Duplicate(i64),
    Backend(String),
}

impl fmt::Display for BookStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookStoreError::NotFound => write!(f, "book not found"),
            BookStoreError::Duplicate(id) => write!(f, "book {} already exists", id),
            BookStoreError::Backend(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for BookStoreError {}

impl From<rusqlite::Error> for BookStoreError {
    fn from(e: rusqlite::Error) -> Self {
        BookStoreError::Backend(e.to_string())
    }
}

pub trait BookStore: Send + Sync {
    fn create(&self, book: &Book) -> Result<(), BookStoreError>;
    fn get_by_id(&self, id: i64) -> Result<Book, BookStoreError>;
    fn get_all(&self) -> Result<Vec<Book>, BookStoreError>;
    fn update(&self, book: &Book) -> Result<(), BookStoreError>;
    fn delete(&self, id: i64) -> Result<(), BookStoreError>;
}

pub struct SqliteBookStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBookStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, BookStoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, BookStoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, BookStoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                price REAL NOT NULL,
                quantity INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        price: row.get(3)?,
        quantity: row.get(4)?,
    })
}

impl BookStore for SqliteBookStore {
    fn create(&self, book: &Book) -> Result<(), BookStoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books (id, title, author, price, quantity) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![book.id, book.title, book.author, book.price, book.quantity],
        )
        .map_err(|e| match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                BookStoreError::Duplicate(book.id)
            }
            _ => BookStoreError::Backend(e.to_string()),
        })?;

        debug!(book_id = book.id, title = %book.title, "Inserted book");
        Ok(())
    }

    fn get_by_id(&self, id: i64) -> Result<Book, BookStoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, title, author, price, quantity FROM books WHERE id = ?1",
            params![id],
            row_to_book,
        )
        .optional()?
        .ok_or(BookStoreError::NotFound)
    }

    fn get_all(&self) -> Result<Vec<Book>, BookStoreError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, title, author, price, quantity FROM books ORDER BY id")?;
        let books = stmt
            .query_map([], row_to_book)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn update(&self, book: &Book) -> Result<(), BookStoreError> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            "UPDATE books SET title = ?1, author = ?2, price = ?3, quantity = ?4 WHERE id = ?5",
            params![book.title, book.author, book.price, book.quantity, book.id],
        )?;
        if rows_affected == 0 {
            return Err(BookStoreError::NotFound);
        }
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<(), BookStoreError> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute("DELETE FROM books WHERE id = ?1", params![id])?;
        if rows_affected == 0 {
            return Err(BookStoreError::NotFound);
        }
        Ok(())
    }
}
