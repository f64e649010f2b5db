//! Loan engine against a real PostgreSQL database.
//!
//! Needs `DATABASE_URL`; run with `cargo test -- --ignored`.

use std::sync::Arc;

use booklend_server::{
    error::AppError,
    models::{
        book::CreateBook,
        user::{CreateUser, Role},
    },
    repository::Repository,
    services::loans::LoansService,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

async fn pool() -> PgPool {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn book(repository: &Repository, quantity: i32) -> Uuid {
    repository
        .books
        .create(&CreateBook {
            title: "Neuromancer".into(),
            isbn: format!("978-{}", Uuid::new_v4().simple()),
            quantity,
        })
        .await
        .unwrap()
        .id
}

async fn member(repository: &Repository) -> Uuid {
    repository
        .users
        .create(
            &CreateUser {
                name: "Ledger Tester".into(),
                email: format!("ledger-{}@library.com", Uuid::new_v4()),
                password: "unused".into(),
                role: Some(Role::Member),
            },
            "not-a-real-hash",
        )
        .await
        .unwrap()
        .id
}

async fn quantity(repository: &Repository, book_id: Uuid) -> i32 {
    repository.books.get_active(book_id).await.unwrap().quantity
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_issues_never_oversell() {
    let repository = Repository::new(pool().await);
    let book_id = book(&repository, 2).await;
    let engine = Arc::new(LoansService::new(repository.loans.clone()));

    let mut users = Vec::new();
    for _ in 0..10 {
        users.push(member(&repository).await);
    }

    let handles: Vec<_> = users
        .into_iter()
        .map(|user_id| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.issue(user_id, book_id).await })
        })
        .collect();

    let mut issued = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => issued += 1,
            Err(AppError::InvalidState(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(issued, 2);
    assert_eq!(quantity(&repository, book_id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_issues_by_same_user_hit_unique_index() {
    let repository = Repository::new(pool().await);
    let book_id = book(&repository, 5).await;
    let user_id = member(&repository).await;
    let engine = Arc::new(LoansService::new(repository.loans.clone()));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.issue(user_id, book_id).await })
        })
        .collect();

    let mut issued = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => issued += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(issued, 1);
    assert_eq!(quantity(&repository, book_id).await, 4);
}

#[tokio::test]
#[ignore]
async fn test_return_restores_and_blocks_deactivation_until_then() {
    let repository = Repository::new(pool().await);
    let book_id = book(&repository, 1).await;
    let user_id = member(&repository).await;
    let engine = LoansService::new(repository.loans.clone());

    let loan = engine.issue(user_id, book_id).await.unwrap();

    let err = repository.books.deactivate(book_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let err = repository.users.deactivate(user_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    engine.return_book(loan.id, user_id).await.unwrap();
    assert_eq!(quantity(&repository, book_id).await, 1);

    let err = engine.return_book(loan.id, user_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let mine = engine.my_loans(user_id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(mine[0].returned_at.is_some());

    repository.books.deactivate(book_id).await.unwrap();
}
