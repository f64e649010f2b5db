//! Loan management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::loan::{IssueLoan, Loan, LoanDetails, ReturnReceipt},
    AppState,
};

use super::AuthenticatedUser;

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans/issue",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = IssueLoan,
    responses(
        (status = 201, description = "Book issued", body = Loan),
        (status = 403, description = "Member role required"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book already issued to this user"),
        (status = 422, description = "No copy available")
    )
)]
pub async fn issue_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<IssueLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    claims.require_member()?;

    let loan = state
        .services
        .loans
        .issue(claims.user_id, request.book_id)
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/return/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnReceipt),
        (status = 403, description = "Not the borrower of this loan"),
        (status = 404, description = "Loan not found"),
        (status = 422, description = "Already returned")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<Uuid>,
) -> AppResult<Json<ReturnReceipt>> {
    claims.require_member()?;

    let receipt = state
        .services
        .loans
        .return_book(loan_id, claims.user_id)
        .await?;

    Ok(Json(receipt))
}

/// All outstanding loans
#[utoipa::path(
    get,
    path = "/loans/active",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Outstanding loans with book and borrower", body = Vec<LoanDetails>),
        (status = 403, description = "Administrator role required")
    )
)]
pub async fn active_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_admin()?;

    let loans = state.services.loans.active_loans().await?;
    Ok(Json(loans))
}

/// Loan history of the current member
#[utoipa::path(
    get,
    path = "/loans/my-loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loans of the current user", body = Vec<LoanDetails>),
        (status = 403, description = "Member role required")
    )
)]
pub async fn my_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_member()?;

    let loans = state.services.loans.my_loans(claims.user_id).await?;
    Ok(Json(loans))
}
