//! Loan engine: issue and return books while keeping shelf quantities and
//! the loan ledger consistent.
//!
//! Each operation runs in one store transaction. Checks and writes go through
//! the same [`LedgerTx`] handle; returning early with `?` drops the handle,
//! which rolls back anything already written.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    error::{AppError, AppResult},
    models::{
        loan::{NewLoan, ReturnReceipt},
        Loan, LoanDetails,
    },
    repository::{
        ledger::{LedgerTx, LoanStore, ALREADY_ISSUED},
        loans::LoansRepository,
    },
};

const BOOK_NOT_FOUND: &str = "Book not found";
const BOOK_NOT_AVAILABLE: &str = "Book not available";
const LOAN_NOT_FOUND: &str = "Loan not found";
const NOT_BORROWER: &str = "You cannot return this book";
const ALREADY_RETURNED: &str = "Book already returned";

#[derive(Clone)]
pub struct LoansService<S = LoansRepository> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: LoanStore> LoansService<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Lend one copy of a book to a user
    pub async fn issue(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;

        let book = tx
            .lock_book(book_id)
            .await?
            .filter(|book| book.is_active)
            .ok_or_else(|| AppError::NotFound(BOOK_NOT_FOUND.to_string()))?;

        if book.quantity < 1 {
            tracing::warn!(%user_id, %book_id, "Issue refused: no copy available");
            return Err(AppError::InvalidState(BOOK_NOT_AVAILABLE.to_string()));
        }

        if tx.find_outstanding(user_id, book_id).await?.is_some() {
            tracing::warn!(%user_id, %book_id, "Issue refused: already issued to user");
            return Err(AppError::Conflict(ALREADY_ISSUED.to_string()));
        }

        let loan = tx
            .insert_loan(NewLoan::new(user_id, book_id, self.clock.now()))
            .await?;

        if !tx.take_copy(book_id).await? {
            return Err(AppError::InvalidState(BOOK_NOT_AVAILABLE.to_string()));
        }

        tx.commit().await?;

        tracing::info!(loan_id = %loan.id, %user_id, %book_id, "Book issued");
        Ok(loan)
    }

    /// Close a loan on behalf of its borrower and put the copy back on the shelf
    pub async fn return_book(&self, loan_id: Uuid, user_id: Uuid) -> AppResult<ReturnReceipt> {
        let mut tx = self.store.begin().await?;

        let loan = tx
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(LOAN_NOT_FOUND.to_string()))?;

        if loan.user_id != user_id {
            tracing::warn!(%loan_id, %user_id, "Return refused: not the borrower");
            return Err(AppError::Forbidden(NOT_BORROWER.to_string()));
        }

        if !loan.is_outstanding() || !tx.close_loan(loan_id, self.clock.now()).await? {
            return Err(AppError::InvalidState(ALREADY_RETURNED.to_string()));
        }

        if !tx.restore_copy(loan.book_id).await? {
            return Err(AppError::NotFound(BOOK_NOT_FOUND.to_string()));
        }

        tx.commit().await?;

        tracing::info!(%loan_id, %user_id, book_id = %loan.book_id, "Book returned");
        Ok(ReturnReceipt::default())
    }

    /// All outstanding loans with book and borrower
    pub async fn active_loans(&self) -> AppResult<Vec<LoanDetails>> {
        self.store.active_loans().await
    }

    /// Loan history of one user, outstanding and returned
    pub async fn my_loans(&self, user_id: Uuid) -> AppResult<Vec<LoanDetails>> {
        self.store.user_loans(user_id).await
    }
}
