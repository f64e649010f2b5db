//! Catalog management service

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search active books
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.books.search(query).await
    }

    /// Get an active book
    pub async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_active(id).await
    }

    /// Add a title to the catalog
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = %created.id, quantity = created.quantity, "Book created");
        Ok(created)
    }

    /// Update a book; a new `quantity` is a restock
    pub async fn update_book(&self, id: Uuid, book: UpdateBook) -> AppResult<Book> {
        let updated = self.repository.books.update(id, &book).await?;
        if book.quantity.is_some() {
            tracing::info!(book_id = %id, quantity = updated.quantity, "Book restocked");
        }
        Ok(updated)
    }

    /// Soft delete a book that has no copy out on loan
    pub async fn delete_book(&self, id: Uuid) -> AppResult<Book> {
        let book = self.repository.books.deactivate(id).await?;
        tracing::info!(book_id = %id, "Book deactivated");
        Ok(book)
    }
}
