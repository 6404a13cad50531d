//! Book Catalog
//! Mission: Plain CRUD over the book inventory; writes are admin-gated at the router

pub mod api;
pub mod models;
pub mod service;
pub mod store;

pub use models::Book;
pub use service::{BookError, BookService};
pub use store::{BookStore, SqliteBookStore};
