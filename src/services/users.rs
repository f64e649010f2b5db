//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, Login, Signup, UpdateUser, User, UserClaims, UserQuery},
    repository::Repository,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new member
    pub async fn signup(&self, signup: Signup) -> AppResult<User> {
        self.create_user(signup.into()).await
    }

    /// Authenticate by email and password, returning a JWT and the user
    pub async fn login(&self, login: &Login) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_email(&login.email)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(&user.password, &login.password)? {
            tracing::warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        let token = UserClaims::new(&user, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok((token, user))
    }

    /// Get an active user
    pub async fn get_active(&self, id: Uuid) -> AppResult<User> {
        self.repository.users.get_active(id).await
    }

    /// Search active users
    pub async fn search_users(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        self.repository.users.search(query).await
    }

    /// Create a new user
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        if self.repository.users.email_exists(&user.email, None).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password = hash_password(&user.password)?;
        let created = self.repository.users.create(&user, &password).await?;
        tracing::info!(user_id = %created.id, role = %created.role, "User created");
        Ok(created)
    }

    /// Update an existing user
    pub async fn update_user(&self, id: Uuid, user: UpdateUser) -> AppResult<User> {
        self.repository.users.get_active(id).await?;

        if let Some(ref email) = user.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }

        let password = match user.password {
            Some(ref password) => Some(hash_password(password)?),
            None => None,
        };

        self.repository
            .users
            .update(id, &user, password.as_deref())
            .await
    }

    /// Soft delete a user without outstanding loans
    pub async fn delete_user(&self, id: Uuid) -> AppResult<User> {
        let user = self.repository.users.deactivate(id).await?;
        tracing::info!(user_id = %id, "User deactivated");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "battery staple").unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(verify_password("not-a-hash", "anything").is_err());
    }
}
