//! Users repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, UpdateUser, User, UserQuery},
};

fn map_unique_email(error: sqlx::Error) -> AppError {
    match error {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict("Email already registered".to_string())
        }
        other => AppError::Database(other),
    }
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID, active or not
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Get an active user by ID
    pub async fn get_active(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Get user by email (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::uuid IS NULL OR id != $2))",
        )
        .bind(email.trim())
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Search active users
    pub async fn search(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        let name = query
            .name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim()));
        let email = query
            .email
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim()));

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE is_active
              AND ($1::text IS NULL OR name ILIKE $1)
              AND ($2::text IS NULL OR email ILIKE $2)
            ORDER BY name ASC
            "#,
        )
        .bind(name)
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Count active users
    pub async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Create a new user with an already hashed password
    pub async fn create(&self, user: &CreateUser, password_hash: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.name.trim())
        .bind(user.email.trim())
        .bind(password_hash)
        .bind(user.role.unwrap_or_default())
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_email)
    }

    /// Update an active user. Absent fields keep their value.
    pub async fn update(&self, id: Uuid, user: &UpdateUser, password_hash: Option<&str>) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                password = COALESCE($4, password),
                role = COALESCE($5, role),
                updated_at = NOW()
            WHERE id = $1 AND is_active
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user.name.as_deref().map(str::trim))
        .bind(user.email.as_deref().map(str::trim))
        .bind(password_hash)
        .bind(user.role)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_email)?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Soft delete a user. Refused while the user holds outstanding loans.
    pub async fn deactivate(&self, id: Uuid) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let outstanding: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND returned_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if outstanding > 0 {
            return Err(AppError::InvalidState(
                "User cannot be deleted: active loans exist".to_string(),
            ));
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }
}
