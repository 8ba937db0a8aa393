//! In-memory stores and fixtures for unit and router tests

use async_trait::async_trait;
use axum::Router;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    auth::{AccessPolicy, Principal},
    config::{AppConfig, AuthConfig, CacheConfig, DatabaseConfig, LoggingConfig, ServerConfig},
    error::{AppError, AppResult, EntityKind},
    models::{
        author::CreateAuthor,
        book::CreateBook,
        borrowing::NewBorrowing,
        member::{AccountStatus, NewMember},
        profile::NewProfile,
        Author, Book, BorrowingRecord, Member, MemberProfile, PageQuery, Role,
    },
    repository::{AuthorStore, BookStore, BorrowingStore, MemberStore, ProfileStore, Repository},
    services::{cache::Caches, members::hash_password, Services},
    AppState,
};

/// Password hash that matches no password
const UNUSABLE_HASH: &str = "!";

/// Rows keyed by id, counting every write
pub struct FakeTable<T> {
    rows: Mutex<BTreeMap<i32, T>>,
    next_id: Mutex<i32>,
    writes: AtomicUsize,
}

impl<T: Clone> FakeTable<T> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            next_id: Mutex::new(1),
            writes: AtomicUsize::new(0),
        }
    }

    /// Inserts, updates and deletes seen so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: i32) -> Option<T> {
        self.rows.lock().get(&id).cloned()
    }

    fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.rows.lock().values().find(|r| pred(*r)).cloned()
    }

    fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.lock().values().filter(|r| pred(*r)).cloned().collect()
    }

    fn page(&self, page: &PageQuery) -> (Vec<T>, i64) {
        let rows = self.rows.lock();
        let items = rows
            .values()
            .skip(page.offset() as usize)
            .take(page.per_page() as usize)
            .cloned()
            .collect();
        (items, rows.len() as i64)
    }

    fn insert_with(&self, build: impl FnOnce(i32) -> T) -> T {
        let id = {
            let mut next = self.next_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        let row = build(id);
        self.rows.lock().insert(id, row.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        row
    }

    fn replace(&self, id: i32, row: T, kind: EntityKind) -> AppResult<T> {
        let mut rows = self.rows.lock();
        if !rows.contains_key(&id) {
            return Err(AppError::not_found(kind, id));
        }
        rows.insert(id, row.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    fn remove(&self, id: i32) {
        self.rows.lock().remove(&id);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthorStore for FakeTable<Author> {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Author>> {
        Ok(self.get(id))
    }

    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Author>, i64)> {
        Ok(self.page(page))
    }

    async fn insert(&self, author: &CreateAuthor) -> AppResult<Author> {
        Ok(self.insert_with(|id| Author {
            id,
            name: author.name.clone(),
            biography: author.biography.clone(),
        }))
    }

    async fn update(&self, author: &Author) -> AppResult<Author> {
        self.replace(author.id, author.clone(), EntityKind::Author)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        self.remove(id);
        Ok(())
    }
}

#[async_trait]
impl BookStore for FakeTable<Book> {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.get(id))
    }

    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Book>, i64)> {
        Ok(self.page(page))
    }

    async fn insert(&self, book: &CreateBook) -> AppResult<Book> {
        Ok(self.insert_with(|id| Book {
            id,
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            author_id: book.author_id,
            publication_year: book.publication_year,
        }))
    }

    async fn update(&self, book: &Book) -> AppResult<Book> {
        self.replace(book.id, book.clone(), EntityKind::Book)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        self.remove(id);
        Ok(())
    }
}

#[async_trait]
impl MemberStore for FakeTable<Member> {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Member>> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Member>> {
        Ok(self.find(|m| m.email.eq_ignore_ascii_case(email)))
    }

    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Member>, i64)> {
        Ok(self.page(page))
    }

    async fn insert(&self, member: &NewMember) -> AppResult<Member> {
        Ok(self.insert_with(|id| Member {
            id,
            email: member.email.clone(),
            name: member.name.clone(),
            password: member.password_hash.clone(),
            roles: member.roles.clone(),
            enabled: true,
            account_non_expired: true,
            account_non_locked: true,
            credentials_non_expired: true,
            profile_id: None,
            crea_date: Utc::now(),
        }))
    }

    async fn update(&self, member: &Member) -> AppResult<Member> {
        // Roles are not writable through updates
        let roles = self
            .get(member.id)
            .map(|m| m.roles)
            .ok_or_else(|| AppError::not_found(EntityKind::Member, member.id))?;
        self.replace(
            member.id,
            Member {
                roles,
                ..member.clone()
            },
            EntityKind::Member,
        )
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        self.remove(id);
        Ok(())
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        Ok(self
            .find(|m| m.email.eq_ignore_ascii_case(email) && Some(m.id) != exclude_id)
            .is_some())
    }
}

#[async_trait]
impl ProfileStore for FakeTable<MemberProfile> {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<MemberProfile>> {
        Ok(self.get(id))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<MemberProfile>> {
        Ok(self.find(|p| p.email.eq_ignore_ascii_case(email)))
    }

    async fn find_by_member(&self, member_id: i32) -> AppResult<Option<MemberProfile>> {
        Ok(self.find(|p| p.member_id == member_id))
    }

    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<MemberProfile>, i64)> {
        Ok(self.page(page))
    }

    async fn insert(&self, profile: &NewProfile) -> AppResult<MemberProfile> {
        Ok(self.insert_with(|id| MemberProfile {
            id,
            member_id: profile.member_id,
            email: profile.email.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            phone: profile.phone.clone(),
            address: profile.address.clone(),
        }))
    }

    async fn update(&self, profile: &MemberProfile) -> AppResult<MemberProfile> {
        self.replace(profile.id, profile.clone(), EntityKind::Profile)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        self.remove(id);
        Ok(())
    }
}

#[async_trait]
impl BorrowingStore for FakeTable<BorrowingRecord> {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<BorrowingRecord>> {
        Ok(self.get(id))
    }

    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<BorrowingRecord>, i64)> {
        Ok(self.page(page))
    }

    async fn list_by_member(&self, member_id: i32, active_only: bool) -> AppResult<Vec<BorrowingRecord>> {
        Ok(self.filter(|r| r.member_id == member_id && (!active_only || !r.is_returned())))
    }

    async fn count_active_by_member(&self, member_id: i32) -> AppResult<i64> {
        Ok(self.filter(|r| r.member_id == member_id && !r.is_returned()).len() as i64)
    }

    async fn insert(&self, record: &NewBorrowing) -> AppResult<BorrowingRecord> {
        Ok(self.insert_with(|id| BorrowingRecord {
            id,
            book_id: record.book_id,
            member_id: record.member_id,
            borrow_date: record.borrow_date,
            return_date: None,
            approved: false,
        }))
    }

    async fn update(&self, record: &BorrowingRecord) -> AppResult<BorrowingRecord> {
        self.replace(record.id, record.clone(), EntityKind::Borrowing)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        self.remove(id);
        Ok(())
    }
}

/// Member value for mock expectations
pub fn member(id: i32, email: &str, roles: &[Role]) -> Member {
    Member {
        id,
        email: email.to_string(),
        name: email.split('@').next().unwrap_or(email).to_string(),
        password: UNUSABLE_HASH.to_string(),
        roles: roles.iter().copied().collect(),
        enabled: true,
        account_non_expired: true,
        account_non_locked: true,
        credentials_non_expired: true,
        profile_id: None,
        crea_date: Utc::now(),
    }
}

/// Services wired to fresh in-memory stores and caches
pub struct TestContext {
    pub authors: Arc<FakeTable<Author>>,
    pub books: Arc<FakeTable<Book>>,
    pub members: Arc<FakeTable<Member>>,
    pub profiles: Arc<FakeTable<MemberProfile>>,
    pub borrowings: Arc<FakeTable<BorrowingRecord>>,
    pub caches: Caches,
    pub services: Arc<Services>,
    pub config: Arc<AppConfig>,
}

impl TestContext {
    pub fn new() -> Self {
        let authors: Arc<FakeTable<Author>> = Arc::new(FakeTable::new());
        let books: Arc<FakeTable<Book>> = Arc::new(FakeTable::new());
        let members: Arc<FakeTable<Member>> = Arc::new(FakeTable::new());
        let profiles: Arc<FakeTable<MemberProfile>> = Arc::new(FakeTable::new());
        let borrowings: Arc<FakeTable<BorrowingRecord>> = Arc::new(FakeTable::new());

        let repository = Repository::from_stores(
            authors.clone(),
            books.clone(),
            members.clone(),
            profiles.clone(),
            borrowings.clone(),
        );

        let config = AppConfig {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            cache: CacheConfig::default(),
        };

        let caches = Caches::in_memory();
        let services = Services::new(repository, caches.clone(), &config.auth);

        Self {
            authors,
            books,
            members,
            profiles,
            borrowings,
            caches,
            services: Arc::new(services),
            config: Arc::new(config),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            services: self.services.clone(),
            policy: Arc::new(AccessPolicy::default()),
        }
    }

    /// Full API router over this context
    pub fn router(&self) -> Router {
        crate::api::create_router(self.state())
    }

    /// Member whose password can never match
    pub fn seed_member(&self, email: &str, roles: &[Role]) -> Member {
        self.insert_member(email, UNUSABLE_HASH.to_string(), roles)
    }

    pub fn seed_member_with_password(&self, email: &str, password: &str, roles: &[Role]) -> Member {
        let hash = hash_password(password).unwrap();
        self.insert_member(email, hash, roles)
    }

    fn insert_member(&self, email: &str, password_hash: String, roles: &[Role]) -> Member {
        let template = member(0, email, roles);
        self.members.insert_with(|id| Member {
            id,
            password: password_hash,
            ..template
        })
    }

    /// Lock the account through the service so cached copies follow
    pub async fn lock_member(&self, id: i32) {
        self.services
            .members
            .update_status(
                id,
                AccountStatus {
                    account_non_locked: false,
                    ..AccountStatus::default()
                },
            )
            .await
            .unwrap();
    }

    pub fn seed_book(&self, title: &str) -> Book {
        self.books.insert_with(|id| Book {
            id,
            title: title.to_string(),
            isbn: None,
            author_id: None,
            publication_year: None,
        })
    }

    /// Profile linked both ways to `member`
    pub fn seed_profile(&self, member: &Member) -> MemberProfile {
        let profile = self.profiles.insert_with(|id| MemberProfile {
            id,
            member_id: member.id,
            email: member.email.clone(),
            first_name: member.name.clone(),
            last_name: "Reader".to_string(),
            phone: None,
            address: None,
        });

        let mut rows = self.members.rows.lock();
        if let Some(row) = rows.get_mut(&member.id) {
            row.profile_id = Some(profile.id);
        }
        profile
    }

    /// Unreturned record borrowed yesterday
    pub fn seed_borrowing(&self, member: &Member, book: &Book, approved: bool) -> BorrowingRecord {
        self.borrowings.insert_with(|id| BorrowingRecord {
            id,
            book_id: book.id,
            member_id: member.id,
            borrow_date: Utc::now() - Duration::days(1),
            return_date: None,
            approved,
        })
    }

    pub fn principal(&self, member: &Member) -> Principal {
        Principal::new(member, member.roles.clone())
    }

    /// `Authorization` header value for `member`
    pub async fn bearer(&self, member: &Member) -> String {
        let issued = self.services.tokens.issue(&member.email).await.unwrap();
        format!("Bearer {}", issued.token)
    }
}
