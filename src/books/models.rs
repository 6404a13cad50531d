//! Book Models

use serde::{Deserialize, Serialize};

/// Catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub price: f64,
    pub quantity: i64,
}

/// Body of PUT /admin/books/:id; the id comes from the path
#[derive(Debug, Clone, Deserialize)]
pub struct BookUpdate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub quantity: i64,
}

impl BookUpdate {
    pub fn into_book(self, id: i64) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            price: self.price,
            quantity: self.quantity,
        }
    }
}
