//! Business logic services

pub mod catalog;
pub mod dashboard;
pub mod loans;
pub mod users;

use crate::{
    config::{AuthConfig, LoansConfig},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub loans: loans::LoansService,
    pub dashboard: dashboard::DashboardService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, loans_config: LoansConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            users: users::UsersService::new(repository.clone(), auth_config),
            loans: loans::LoansService::new(repository.loans.clone()),
            dashboard: dashboard::DashboardService::new(repository, loans_config),
        }
    }
}
