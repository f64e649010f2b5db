//! # Seed Data
//!
//! Creates the initial administrator account so a fresh database can be
//! managed through the API.
//!
//! ## Usage
//! ```bash
//! cargo run --bin seed
//!
//! # Override the database
//! DATABASE_URL=postgres://... cargo run --bin seed
//! ```
//!
//! Running it twice is harmless: an existing account with the same email is
//! left untouched.

use sqlx::postgres::PgPoolOptions;

use booklend_server::{
    config::AppConfig,
    models::user::{CreateUser, Role},
    repository::users::UsersRepository,
    services::users::hash_password,
};

const ADMIN_NAME: &str = "Super Admin";
const ADMIN_EMAIL: &str = "admin@library.com";
const ADMIN_PASSWORD: &str = "admin123";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let users = UsersRepository::new(pool);

    if users.get_by_email(ADMIN_EMAIL).await?.is_some() {
        tracing::info!("Admin already exists");
        return Ok(());
    }

    let admin = CreateUser {
        name: ADMIN_NAME.to_string(),
        email: ADMIN_EMAIL.to_string(),
        password: ADMIN_PASSWORD.to_string(),
        role: Some(Role::Admin),
    };
    let password_hash = hash_password(&admin.password)?;
    let user = users.create(&admin, &password_hash).await?;

    tracing::info!("Admin user created: {} ({})", user.email, user.id);

    Ok(())
}
