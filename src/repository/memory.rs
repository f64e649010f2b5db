//! In-process loan store.
//!
//! Same contract as the PostgreSQL ledger: a transaction holds the store lock
//! from `begin` until it is committed or dropped, works on a staged copy of
//! the state and publishes it only on commit. Used by the test suite and for
//! embedding the engine without a database.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::CreateBook,
        user::Role,
        Book, BookShort, Loan, LoanDetails, NewLoan, User, UserShort,
    },
};

use super::ledger::{LedgerTx, LoanStore, ALREADY_ISSUED};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    books: HashMap<Uuid, Book>,
    users: HashMap<Uuid, User>,
    /// Insertion order is issue order
    loans: IndexMap<Uuid, Loan>,
}

impl MemoryState {
    fn details(&self, loan: &Loan, with_user: bool) -> Option<LoanDetails> {
        let book = self.books.get(&loan.book_id)?;
        let user = if with_user {
            self.users.get(&loan.user_id).map(UserShort::from)
        } else {
            None
        };
        Some(LoanDetails {
            id: loan.id,
            user_id: loan.user_id,
            book_id: loan.book_id,
            issued_at: loan.issued_at,
            returned_at: loan.returned_at,
            book: BookShort::from(book),
            user,
        })
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a book on the shelf
    pub async fn add_book(&self, book: CreateBook) -> Book {
        let now = Utc::now();
        let book = Book {
            id: Uuid::new_v4(),
            title: book.title,
            isbn: book.isbn,
            quantity: book.quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.books.insert(book.id, book.clone());
        book
    }

    /// Register a user
    pub async fn add_user(&self, name: &str, email: &str, role: Role) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password: String::new(),
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.users.insert(user.id, user.clone());
        user
    }

    /// Soft-delete a book. Refused while any copy is out on loan.
    pub async fn deactivate_book(&self, book_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;

        let issued = state
            .loans
            .values()
            .any(|loan| loan.book_id == book_id && loan.is_outstanding());

        let book = state
            .books
            .get_mut(&book_id)
            .filter(|book| book.is_active)
            .ok_or_else(|| AppError::NotFound("Book not found or already deleted".to_string()))?;

        if issued {
            return Err(AppError::InvalidState(
                "Cannot delete book: book is currently issued".to_string(),
            ));
        }

        book.is_active = false;
        book.updated_at = Utc::now();
        Ok(())
    }

    /// Committed view of a book
    pub async fn book(&self, book_id: Uuid) -> Option<Book> {
        self.state.lock().await.books.get(&book_id).cloned()
    }

    /// Committed view of the whole ledger, in issue order
    pub async fn loans(&self) -> Vec<Loan> {
        self.state.lock().await.loans.values().cloned().collect()
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> AppResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTx { guard, staged })
    }

    async fn active_loans(&self) -> AppResult<Vec<LoanDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .loans
            .values()
            .rev()
            .filter(|loan| loan.is_outstanding())
            .filter_map(|loan| state.details(loan, true))
            .collect())
    }

    async fn user_loans(&self, user_id: Uuid) -> AppResult<Vec<LoanDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .loans
            .values()
            .rev()
            .filter(|loan| loan.user_id == user_id)
            .filter_map(|loan| state.details(loan, false))
            .collect())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_book(&mut self, book_id: Uuid) -> AppResult<Option<Book>> {
        Ok(self.staged.books.get(&book_id).cloned())
    }

    async fn find_outstanding(&mut self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<Loan>> {
        Ok(self
            .staged
            .loans
            .values()
            .find(|l| l.user_id == user_id && l.book_id == book_id && l.is_outstanding())
            .cloned())
    }

    async fn insert_loan(&mut self, loan: NewLoan) -> AppResult<Loan> {
        if self.find_outstanding(loan.user_id, loan.book_id).await?.is_some() {
            return Err(AppError::Conflict(ALREADY_ISSUED.to_string()));
        }
        if !self.staged.books.contains_key(&loan.book_id) {
            return Err(AppError::NotFound("Book not found".to_string()));
        }
        let loan = Loan::from(loan);
        self.staged.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn take_copy(&mut self, book_id: Uuid) -> AppResult<bool> {
        match self.staged.books.get_mut(&book_id) {
            Some(book) if book.quantity > 0 => {
                book.quantity -= 1;
                book.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn lock_loan(&mut self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        Ok(self.staged.loans.get(&loan_id).cloned())
    }

    async fn close_loan(&mut self, loan_id: Uuid, returned_at: DateTime<Utc>) -> AppResult<bool> {
        match self.staged.loans.get_mut(&loan_id) {
            Some(loan) if loan.is_outstanding() => {
                loan.returned_at = Some(returned_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_copy(&mut self, book_id: Uuid) -> AppResult<bool> {
        match self.staged.books.get_mut(&book_id) {
            Some(book) => {
                book.quantity += 1;
                book.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn commit(self) -> AppResult<()> {
        let MemoryTx { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }
}
