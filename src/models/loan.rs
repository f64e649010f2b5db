//! Loan (borrow) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::book::BookShort;
use super::user::UserShort;

/// Loan model from database. `returned_at` is null while the copy is out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_outstanding(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Loan about to be written to the ledger
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl NewLoan {
    pub fn new(user_id: Uuid, book_id: Uuid, issued_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            issued_at,
        }
    }
}

impl From<NewLoan> for Loan {
    fn from(loan: NewLoan) -> Self {
        Self {
            id: loan.id,
            user_id: loan.user_id,
            book_id: loan.book_id,
            issued_at: loan.issued_at,
            returned_at: None,
        }
    }
}

/// Loan with joined book (and borrower, for staff listings)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub book: BookShort,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserShort>,
}

/// Issue request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueLoan {
    pub book_id: Uuid,
}

/// Result of a successful return
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnReceipt {
    pub message: String,
}

impl Default for ReturnReceipt {
    fn default() -> Self {
        Self {
            message: "Book returned successfully".to_string(),
        }
    }
}
