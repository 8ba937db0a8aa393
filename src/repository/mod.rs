//! Repository layer for database operations
//!
//! Each entity is reached through a store trait so services can run against
//! PostgreSQL in production and against mocks or in-memory fakes in tests.
//! Absence is reported as `Ok(None)`, never as an error.

pub mod authors;
pub mod books;
pub mod borrowings;
pub mod members;
pub mod profiles;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{
        author::CreateAuthor,
        book::CreateBook,
        borrowing::NewBorrowing,
        member::NewMember,
        profile::NewProfile,
        Author, Book, BorrowingRecord, Member, MemberProfile, PageQuery,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Author>>;
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Author>, i64)>;
    async fn insert(&self, author: &CreateAuthor) -> AppResult<Author>;
    async fn update(&self, author: &Author) -> AppResult<Author>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>>;
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Book>, i64)>;
    async fn insert(&self, book: &CreateBook) -> AppResult<Book>;
    async fn update(&self, book: &Book) -> AppResult<Book>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Member>>;
    /// Case-insensitive lookup by login email
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Member>>;
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Member>, i64)>;
    async fn insert(&self, member: &NewMember) -> AppResult<Member>;
    async fn update(&self, member: &Member) -> AppResult<Member>;
    async fn delete(&self, id: i32) -> AppResult<()>;
    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<MemberProfile>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<MemberProfile>>;
    async fn find_by_member(&self, member_id: i32) -> AppResult<Option<MemberProfile>>;
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<MemberProfile>, i64)>;
    async fn insert(&self, profile: &NewProfile) -> AppResult<MemberProfile>;
    async fn update(&self, profile: &MemberProfile) -> AppResult<MemberProfile>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowingStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<BorrowingRecord>>;
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<BorrowingRecord>, i64)>;
    async fn list_by_member(&self, member_id: i32, active_only: bool) -> AppResult<Vec<BorrowingRecord>>;
    async fn count_active_by_member(&self, member_id: i32) -> AppResult<i64>;
    async fn insert(&self, record: &NewBorrowing) -> AppResult<BorrowingRecord>;
    async fn update(&self, record: &BorrowingRecord) -> AppResult<BorrowingRecord>;
    async fn delete(&self, id: i32) -> AppResult<()>;
}

/// Main repository struct holding one store per entity
#[derive(Clone)]
pub struct Repository {
    pub pool: Option<Pool<Postgres>>,
    pub authors: Arc<dyn AuthorStore>,
    pub books: Arc<dyn BookStore>,
    pub members: Arc<dyn MemberStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub borrowings: Arc<dyn BorrowingStore>,
}

impl Repository {
    /// Create a PostgreSQL-backed repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            authors: Arc::new(authors::AuthorsRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            members: Arc::new(members::MembersRepository::new(pool.clone())),
            profiles: Arc::new(profiles::ProfilesRepository::new(pool.clone())),
            borrowings: Arc::new(borrowings::BorrowingsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Assemble a repository from arbitrary store implementations
    pub fn from_stores(
        authors: Arc<dyn AuthorStore>,
        books: Arc<dyn BookStore>,
        members: Arc<dyn MemberStore>,
        profiles: Arc<dyn ProfileStore>,
        borrowings: Arc<dyn BorrowingStore>,
    ) -> Self {
        Self {
            pool: None,
            authors,
            books,
            members,
            profiles,
            borrowings,
        }
    }

    /// Check database connectivity (no-op without a pool)
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(ref pool) = self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}
