//! Loans repository: the PostgreSQL loan ledger

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookShort,
        dashboard::LoanActivity,
        user::{Role, UserShort},
        Book, Loan, LoanDetails, NewLoan,
    },
};

use super::ledger::{LedgerTx, LoanStore, ALREADY_ISSUED};

const LOAN_DETAILS_SELECT: &str = r#"
    SELECT l.id, l.user_id, l.book_id, l.issued_at, l.returned_at,
           b.title, b.isbn, b.quantity, b.is_active AS book_is_active,
           u.name AS user_name, u.email AS user_email,
           u.role AS user_role, u.is_active AS user_is_active
    FROM loans l
    JOIN books b ON b.id = l.book_id
    LEFT JOIN users u ON u.id = l.user_id
"#;

fn loan_details_from_row(row: &PgRow, with_user: bool) -> LoanDetails {
    let book_id: Uuid = row.get("book_id");
    let user_id: Uuid = row.get("user_id");

    let user = if with_user {
        let role: Option<Role> = row.get("user_role");
        role.map(|role| UserShort {
            id: user_id,
            name: row.get("user_name"),
            email: row.get("user_email"),
            role,
            is_active: row.get("user_is_active"),
        })
    } else {
        None
    };

    LoanDetails {
        id: row.get("id"),
        user_id,
        book_id,
        issued_at: row.get("issued_at"),
        returned_at: row.get("returned_at"),
        book: BookShort {
            id: book_id,
            title: row.get("title"),
            isbn: row.get("isbn"),
            quantity: row.get("quantity"),
            is_active: row.get("book_is_active"),
        },
        user,
    }
}

fn map_insert_error(error: sqlx::Error) -> AppError {
    match error {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict(ALREADY_ISSUED.to_string())
        }
        other => AppError::Database(other),
    }
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Loans whose borrower and book are both still active
    pub async fn activity_all(&self) -> AppResult<Vec<LoanActivity>> {
        let rows = sqlx::query_as::<_, LoanActivity>(
            r#"
            SELECT l.issued_at, l.returned_at
            FROM loans l
            JOIN users u ON u.id = l.user_id
            JOIN books b ON b.id = l.book_id
            WHERE u.is_active AND b.is_active
            ORDER BY l.issued_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// A user's loans on books that are still active
    pub async fn activity_for_user(&self, user_id: Uuid) -> AppResult<Vec<LoanActivity>> {
        let rows = sqlx::query_as::<_, LoanActivity>(
            r#"
            SELECT l.issued_at, l.returned_at
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.user_id = $1 AND b.is_active
            ORDER BY l.issued_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl LoanStore for LoansRepository {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> AppResult<PgLedgerTx> {
        let tx = self.pool.begin().await?;
        Ok(PgLedgerTx { tx })
    }

    async fn active_loans(&self) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            "{} WHERE l.returned_at IS NULL ORDER BY l.issued_at DESC",
            LOAN_DETAILS_SELECT
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| loan_details_from_row(row, true)).collect())
    }

    async fn user_loans(&self, user_id: Uuid) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            "{} WHERE l.user_id = $1 ORDER BY l.issued_at DESC",
            LOAN_DETAILS_SELECT
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| loan_details_from_row(row, false)).collect())
    }
}

/// One loan-engine transaction on PostgreSQL.
///
/// Row locks are taken with `FOR UPDATE`; counters only move through
/// conditional updates, so read committed isolation is enough. The wrapped
/// sqlx transaction rolls back when dropped uncommitted.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_book(&mut self, book_id: Uuid) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(book)
    }

    async fn find_outstanding(&mut self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE user_id = $1 AND book_id = $2 AND returned_at IS NULL",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn insert_loan(&mut self, loan: NewLoan) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (id, user_id, book_id, issued_at, returned_at)
            VALUES ($1, $2, $3, $4, NULL)
            RETURNING *
            "#,
        )
        .bind(loan.id)
        .bind(loan.user_id)
        .bind(loan.book_id)
        .bind(loan.issued_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_insert_error)
    }

    async fn take_copy(&mut self, book_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books SET quantity = quantity - 1, updated_at = NOW()
            WHERE id = $1 AND quantity > 0
            "#,
        )
        .bind(book_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn lock_loan(&mut self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(loan)
    }

    async fn close_loan(&mut self, loan_id: Uuid, returned_at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE loans SET returned_at = $2 WHERE id = $1 AND returned_at IS NULL",
        )
        .bind(loan_id)
        .bind(returned_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn restore_copy(&mut self, book_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE books SET quantity = quantity + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(book_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
