//! Dashboard statistics service

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::dashboard::{AdminDashboardStats, UserDashboardStats},
    repository::Repository,
};

#[derive(Clone)]
pub struct DashboardService {
    repository: Repository,
    config: LoansConfig,
}

impl DashboardService {
    pub fn new(repository: Repository, config: LoansConfig) -> Self {
        Self { repository, config }
    }

    /// Library-wide loan statistics
    pub async fn admin_stats(&self) -> AppResult<AdminDashboardStats> {
        let loans = self.repository.loans.activity_all().await?;
        let total_users = self.repository.users.count_active().await?;

        Ok(AdminDashboardStats::build(
            &loans,
            total_users,
            Utc::now(),
            self.config.overdue_after_days,
        ))
    }

    /// Loan statistics of one member
    pub async fn user_stats(&self, user_id: Uuid) -> AppResult<UserDashboardStats> {
        let active = match self.repository.users.get_by_id(user_id).await {
            Ok(user) => user.is_active,
            Err(AppError::NotFound(_)) => false,
            Err(e) => return Err(e),
        };
        if !active {
            return Err(AppError::InvalidState(
                "Inactive user cannot access dashboard".to_string(),
            ));
        }

        let loans = self.repository.loans.activity_for_user(user_id).await?;

        Ok(UserDashboardStats::build(
            &loans,
            Utc::now(),
            self.config.overdue_after_days,
        ))
    }
}
