//! Storage contract the loan engine runs against.
//!
//! A [`LoanStore`] hands out [`LedgerTx`] handles. Everything done through a
//! handle becomes visible to other transactions only on [`LedgerTx::commit`];
//! dropping a handle without committing rolls every write back. Two
//! transactions that lock the same book (or the same loan) never interleave
//! their read-check-mutate sequences.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Book, Loan, LoanDetails, NewLoan},
};

pub const ALREADY_ISSUED: &str = "You already have this book issued. Return it first.";

#[async_trait]
pub trait LoanStore: Clone + Send + Sync + 'static {
    type Tx: LedgerTx;

    /// Open a transaction
    async fn begin(&self) -> AppResult<Self::Tx>;

    /// Outstanding loans with book and borrower, newest first
    async fn active_loans(&self) -> AppResult<Vec<LoanDetails>>;

    /// Every loan of one user with its book, newest first
    async fn user_loans(&self, user_id: Uuid) -> AppResult<Vec<LoanDetails>>;
}

#[async_trait]
pub trait LedgerTx: Send {
    /// Fetch a book and hold its row lock until the transaction ends
    async fn lock_book(&mut self, book_id: Uuid) -> AppResult<Option<Book>>;

    /// Outstanding loan for this user and book, if any
    async fn find_outstanding(&mut self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Loan>>;

    /// Append a loan. Fails with `Conflict` when the user already holds an
    /// outstanding loan for the same book.
    async fn insert_loan(&mut self, loan: NewLoan) -> AppResult<Loan>;

    /// `quantity = quantity - 1` if at least one copy is on the shelf.
    /// Returns false (and changes nothing) otherwise.
    async fn take_copy(&mut self, book_id: Uuid) -> AppResult<bool>;

    /// Fetch a loan and hold its row lock until the transaction ends
    async fn lock_loan(&mut self, loan_id: Uuid) -> AppResult<Option<Loan>>;

    /// Set `returned_at` if the loan is still outstanding. Returns false otherwise.
    async fn close_loan(&mut self, loan_id: Uuid, returned_at: DateTime<Utc>) -> AppResult<bool>;

    /// `quantity = quantity + 1`. Returns false if the book row is gone.
    async fn restore_copy(&mut self, book_id: Uuid) -> AppResult<bool>;

    async fn commit(self) -> AppResult<()>;
}
