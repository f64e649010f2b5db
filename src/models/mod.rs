//! Data models for Booklend

pub mod book;
pub mod dashboard;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookShort};
pub use loan::{Loan, LoanDetails, NewLoan};
pub use user::{Role, User, UserClaims, UserShort};
