//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::user::{Login, Role, Signup, User},
    AppState,
};

use super::AuthenticatedUser;

/// Signup response
#[derive(Serialize, ToSchema)]
pub struct SignupResponse {
    pub message: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Login response
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    /// JWT bearer token
    pub access_token: String,
    pub token_type: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Register a new member account
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = Signup,
    responses(
        (status = 201, description = "User created", body = SignupResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<Signup>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    request.validate()?;

    let user = state.services.users.signup(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully".to_string(),
            name: user.name,
            email: user.email,
            role: user.role,
        }),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = Login,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<Login>,
) -> AppResult<Json<LoginResponse>> {
    request.validate()?;

    let (access_token, user) = state.services.users.login(&request).await?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        name: user.name,
        email: user.email,
        role: user.role,
    }))
}

/// Current user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_active(claims.user_id).await?;
    Ok(Json(user))
}
