//! Repository layer for database operations

pub mod books;
pub mod ledger;
pub mod loans;
pub mod memory;
pub mod users;

use sqlx::{Pool, Postgres};

pub use ledger::{LedgerTx, LoanStore};
pub use memory::MemoryStore;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub users: users::UsersRepository,
    pub loans: loans::LoansRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
        }
    }
}
