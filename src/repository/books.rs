//! Books repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

fn like_pattern(s: &str) -> String {
    format!("%{}%", s.trim())
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get an active book by ID
    pub async fn get_active(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 AND is_active")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// Search active books, ordered by title
    pub async fn search(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE is_active
              AND ($1::text IS NULL OR title ILIKE $1 OR isbn ILIKE $1)
              AND ($2::text IS NULL OR title ILIKE $2)
              AND ($3::text IS NULL OR isbn ILIKE $3)
            ORDER BY title ASC
            "#,
        )
        .bind(query.q.as_deref().filter(|s| !s.trim().is_empty()).map(like_pattern))
        .bind(query.title.as_deref().filter(|s| !s.trim().is_empty()).map(like_pattern))
        .bind(query.isbn.as_deref().filter(|s| !s.trim().is_empty()).map(like_pattern))
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Create a new book
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (id, title, isbn, quantity, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(book.title.trim())
        .bind(book.isbn.trim())
        .bind(book.quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update an active book. Absent fields keep their value.
    pub async fn update(&self, id: Uuid, book: &UpdateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                isbn = COALESCE($3, isbn),
                quantity = COALESCE($4, quantity),
                updated_at = NOW()
            WHERE id = $1 AND is_active
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(book.title.as_deref().map(str::trim))
        .bind(book.isbn.as_deref().map(str::trim))
        .bind(book.quantity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// Soft delete a book. Refused while any copy is out on loan.
    pub async fn deactivate(&self, id: Uuid) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 AND is_active FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found or already deleted".to_string()))?;

        let outstanding: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND returned_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if outstanding > 0 {
            return Err(AppError::InvalidState(
                "Cannot delete book: book is currently issued".to_string(),
            ));
        }

        let book = sqlx::query_as::<_, Book>(
            "UPDATE books SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(book)
    }
}
