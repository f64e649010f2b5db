//! Dashboard statistics endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::dashboard::{AdminDashboardStats, UserDashboardStats},
    AppState,
};

use super::AuthenticatedUser;

/// Library-wide loan statistics
#[utoipa::path(
    get,
    path = "/admin/dashboard-stats",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Admin dashboard", body = AdminDashboardStats),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn admin_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AdminDashboardStats>> {
    claims.require_admin()?;

    let stats = state.services.dashboard.admin_stats().await?;
    Ok(Json(stats))
}

/// Loan statistics of the current member
#[utoipa::path(
    get,
    path = "/users/dashboard-stats",
    tag = "dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Member dashboard", body = UserDashboardStats),
        (status = 403, description = "Member role required"),
        (status = 422, description = "Inactive user")
    )
)]
pub async fn user_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserDashboardStats>> {
    claims.require_member()?;

    let stats = state.services.dashboard.user_stats(claims.user_id).await?;
    Ok(Json(stats))
}
