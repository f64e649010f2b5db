//! Loan engine behaviour against the in-process store

use std::sync::Arc;

use booklend_server::{
    error::AppError,
    models::{book::CreateBook, Role},
    repository::MemoryStore,
    services::loans::LoansService,
};
use uuid::Uuid;

async fn shelf(store: &MemoryStore, quantity: i32) -> Uuid {
    store
        .add_book(CreateBook {
            title: "Dune".into(),
            isbn: "9780441172719".into(),
            quantity,
        })
        .await
        .id
}

async fn member(store: &MemoryStore, name: &str) -> Uuid {
    store
        .add_user(name, &format!("{}@library.com", name.to_lowercase()), Role::Member)
        .await
        .id
}

async fn quantity(store: &MemoryStore, book_id: Uuid) -> i32 {
    store.book(book_id).await.unwrap().quantity
}

#[tokio::test]
async fn test_issue_takes_one_copy() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 3).await;
    let user_id = member(&store, "Ada").await;
    let engine = LoansService::new(store.clone());

    let loan = engine.issue(user_id, book_id).await.unwrap();

    assert_eq!(loan.user_id, user_id);
    assert_eq!(loan.book_id, book_id);
    assert!(loan.returned_at.is_none());
    assert_eq!(quantity(&store, book_id).await, 2);
    assert_eq!(store.loans().await, vec![loan]);
}

#[tokio::test]
async fn test_issue_and_return_restores_quantity() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 1).await;
    let user_id = member(&store, "Ada").await;
    let engine = LoansService::new(store.clone());

    let loan = engine.issue(user_id, book_id).await.unwrap();
    assert_eq!(quantity(&store, book_id).await, 0);

    engine.return_book(loan.id, user_id).await.unwrap();
    assert_eq!(quantity(&store, book_id).await, 1);

    let loans = store.loans().await;
    assert_eq!(loans.len(), 1);
    assert!(loans[0].returned_at.unwrap() >= loans[0].issued_at);
}

#[tokio::test]
async fn test_issue_out_of_stock_is_invalid_state() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 0).await;
    let user_id = member(&store, "Ada").await;
    let engine = LoansService::new(store.clone());

    let err = engine.issue(user_id, book_id).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(quantity(&store, book_id).await, 0);
    assert!(store.loans().await.is_empty());
}

#[tokio::test]
async fn test_issue_unknown_book_is_not_found() {
    let store = MemoryStore::new();
    let user_id = member(&store, "Ada").await;
    let engine = LoansService::new(store.clone());

    let err = engine.issue(user_id, Uuid::new_v4()).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert!(store.loans().await.is_empty());
}

#[tokio::test]
async fn test_second_issue_of_same_book_is_conflict() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 5).await;
    let user_id = member(&store, "Ada").await;
    let engine = LoansService::new(store.clone());

    engine.issue(user_id, book_id).await.unwrap();
    let err = engine.issue(user_id, book_id).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(quantity(&store, book_id).await, 4);
    assert_eq!(store.loans().await.len(), 1);
}

#[tokio::test]
async fn test_reissue_after_return_is_allowed() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 1).await;
    let user_id = member(&store, "Ada").await;
    let engine = LoansService::new(store.clone());

    let first = engine.issue(user_id, book_id).await.unwrap();
    engine.return_book(first.id, user_id).await.unwrap();
    let second = engine.issue(user_id, book_id).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(quantity(&store, book_id).await, 0);
    assert_eq!(store.loans().await.len(), 2);
}

#[tokio::test]
async fn test_return_by_other_user_is_forbidden() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 1).await;
    let ada = member(&store, "Ada").await;
    let bob = member(&store, "Bob").await;
    let engine = LoansService::new(store.clone());

    let loan = engine.issue(ada, book_id).await.unwrap();
    let err = engine.return_book(loan.id, bob).await.unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(quantity(&store, book_id).await, 0);
    assert!(store.loans().await[0].returned_at.is_none());
}

#[tokio::test]
async fn test_second_return_is_invalid_state() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 1).await;
    let user_id = member(&store, "Ada").await;
    let engine = LoansService::new(store.clone());

    let loan = engine.issue(user_id, book_id).await.unwrap();
    engine.return_book(loan.id, user_id).await.unwrap();
    let returned_at = store.loans().await[0].returned_at;

    let err = engine.return_book(loan.id, user_id).await.unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(quantity(&store, book_id).await, 1);
    assert_eq!(store.loans().await[0].returned_at, returned_at);
}

#[tokio::test]
async fn test_return_unknown_loan_is_not_found() {
    let store = MemoryStore::new();
    let user_id = member(&store, "Ada").await;
    let engine = LoansService::new(store);

    let err = engine.return_book(Uuid::new_v4(), user_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_active_loans_lists_only_outstanding_with_borrower() {
    let store = MemoryStore::new();
    let dune = shelf(&store, 2).await;
    let ada = member(&store, "Ada").await;
    let bob = member(&store, "Bob").await;
    let engine = LoansService::new(store.clone());

    let returned = engine.issue(ada, dune).await.unwrap();
    engine.return_book(returned.id, ada).await.unwrap();
    let outstanding = engine.issue(bob, dune).await.unwrap();

    let active = engine.active_loans().await.unwrap();

    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, outstanding.id);
    assert_eq!(active[0].book.title, "Dune");
    assert_eq!(active[0].user.as_ref().unwrap().name, "Bob");
}

#[tokio::test]
async fn test_my_loans_lists_history_of_one_user_newest_first() {
    let store = MemoryStore::new();
    let dune = shelf(&store, 2).await;
    let ada = member(&store, "Ada").await;
    let bob = member(&store, "Bob").await;
    let engine = LoansService::new(store.clone());

    let first = engine.issue(ada, dune).await.unwrap();
    engine.return_book(first.id, ada).await.unwrap();
    let second = engine.issue(ada, dune).await.unwrap();
    engine.issue(bob, dune).await.unwrap();

    let mine = engine.my_loans(ada).await.unwrap();

    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].id, second.id);
    assert_eq!(mine[1].id, first.id);
    assert!(mine.iter().all(|loan| loan.user_id == ada));
    assert!(mine[1].returned_at.is_some());
}

#[tokio::test]
async fn test_single_copy_passes_between_members() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 1).await;
    let ada = member(&store, "Ada").await;
    let cy = member(&store, "Cy").await;
    let engine = LoansService::new(store.clone());

    let loan = engine.issue(ada, book_id).await.unwrap();

    let err = engine.issue(cy, book_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    engine.return_book(loan.id, ada).await.unwrap();
    assert_eq!(quantity(&store, book_id).await, 1);

    engine.issue(cy, book_id).await.unwrap();
    assert_eq!(quantity(&store, book_id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issues_never_oversell() {
    const COPIES: i32 = 3;
    const BORROWERS: usize = 12;

    let store = MemoryStore::new();
    let book_id = shelf(&store, COPIES).await;
    let engine = Arc::new(LoansService::new(store.clone()));

    let mut users = Vec::with_capacity(BORROWERS);
    for i in 0..BORROWERS {
        users.push(member(&store, &format!("Reader{}", i)).await);
    }

    let handles: Vec<_> = users
        .into_iter()
        .map(|user_id| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.issue(user_id, book_id).await })
        })
        .collect();

    let mut issued = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => issued += 1,
            Err(AppError::InvalidState(_)) => refused += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(issued, COPIES as usize);
    assert_eq!(refused, BORROWERS - COPIES as usize);
    assert_eq!(quantity(&store, book_id).await, 0);
    assert_eq!(store.loans().await.len(), COPIES as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issues_by_same_user_create_one_loan() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 10).await;
    let user_id = member(&store, "Ada").await;
    let engine = Arc::new(LoansService::new(store.clone()));

    let handles: Vec<_> = (0..8)
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
    assert_eq!(quantity(&store, book_id).await, 9);
    assert_eq!(store.loans().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_returns_close_loan_once() {
    let store = MemoryStore::new();
    let book_id = shelf(&store, 1).await;
    let user_id = member(&store, "Ada").await;
    let engine = Arc::new(LoansService::new(store.clone()));

    let loan_id = engine.issue(user_id, book_id).await.unwrap().id;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.return_book(loan_id, user_id).await })
        })
        .collect();

    let mut returned = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => returned += 1,
            Err(AppError::InvalidState(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(returned, 1);
    assert_eq!(quantity(&store, book_id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_issue_and_return_conserve_copies() {
    const COPIES: i32 = 4;

    let store = MemoryStore::new();
    let book_id = shelf(&store, COPIES).await;
    let engine = Arc::new(LoansService::new(store.clone()));

    let mut users = Vec::new();
    for i in 0..8 {
        users.push(member(&store, &format!("Cycler{}", i)).await);
    }

    let handles: Vec<_> = users
        .into_iter()
        .map(|user_id| {
            let engine = engine.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    if let Ok(loan) = engine.issue(user_id, book_id).await {
                        engine.return_book(loan.id, user_id).await.unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    let loans = store.loans().await;
    assert!(loans.iter().all(|loan| loan.returned_at.is_some()));
    assert_eq!(quantity(&store, book_id).await, COPIES);
}
