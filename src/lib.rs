//! Booklend Library Loan Server
//!
//! A REST JSON API for lending books: members borrow and return copies,
//! administrators manage the catalog and accounts, and dashboards report loan
//! statistics. The loan engine keeps shelf quantities and the loan ledger
//! consistent under concurrent requests.

use std::sync::Arc;

use sqlx::PgPool;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pool: PgPool,
}

impl AppState {
    /// Wire repositories and services on top of a connection pool
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        let repository = repository::Repository::new(pool.clone());
        let services = services::Services::new(
            repository,
            config.auth.clone(),
            config.loans.clone(),
        );

        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            pool,
        }
    }
}
