//! Borrowing lifecycle service
//!
//! A record moves Requested -> Approved -> Returned; deletion is allowed from
//! any state. Every operation takes the caller's [`Principal`] explicitly:
//! staff run the lending desk, members act on their own records only.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    auth::Principal,
    error::{AppError, AppResult, EntityKind},
    models::{
        borrowing::{CreateBorrowing, NewBorrowing, UpdateBorrowing},
        Book, BorrowingRecord, Member, Page, PageQuery,
    },
    repository::Repository,
};

use super::{
    cache::{CacheKey, Cached, Caches},
    catalog::CatalogService,
    members::MembersService,
};

#[derive(Clone)]
pub struct BorrowingsService {
    repository: Repository,
    caches: Caches,
    catalog: CatalogService,
    members: MembersService,
}

impl BorrowingsService {
    pub fn new(
        repository: Repository,
        caches: Caches,
        catalog: CatalogService,
        members: MembersService,
    ) -> Self {
        Self {
            repository,
            caches,
            catalog,
            members,
        }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Arc<BorrowingRecord>>> {
        let store = self.repository.borrowings.clone();
        self.caches
            .borrowings
            .get_or_load(CacheKey::Id(id), || async move { store.find_by_id(id).await })
            .await
    }

    /// Email of the member owning the record
    pub async fn owner_email(&self, id: i32) -> AppResult<Option<String>> {
        let Some(record) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        Ok(self
            .members
            .find_by_id(record.member_id)
            .await?
            .map(|m| m.email.clone()))
    }

    /// Load a record the caller may act on.
    ///
    /// Staff see every record and get NotFound for missing ones; anyone else
    /// gets the same denial for a missing record and for someone else's.
    async fn accessible(&self, principal: &Principal, id: i32) -> AppResult<BorrowingRecord> {
        let record = self.find_by_id(id).await?;

        if principal.is_staff() {
            return record
                .map(|r| r.as_ref().clone())
                .ok_or_else(|| AppError::not_found(EntityKind::Borrowing, id));
        }

        let Some(record) = record else {
            return Err(AppError::forbidden());
        };
        if self.is_owner(principal, &record).await? {
            Ok(record.as_ref().clone())
        } else {
            Err(AppError::forbidden())
        }
    }

    async fn is_owner(&self, principal: &Principal, record: &BorrowingRecord) -> AppResult<bool> {
        Ok(self
            .members
            .find_by_id(record.member_id)
            .await?
            .is_some_and(|m| principal.is(&m.email)))
    }

    /// Find the referenced book and member and check the display fields
    /// supplied alongside their ids
    async fn resolve(
        &self,
        book_id: i32,
        book_title: Option<&str>,
        member_id: i32,
        member_email: &str,
        member_name: Option<&str>,
    ) -> AppResult<(Book, Member)> {
        let book = self.catalog.get_book(book_id).await?;
        let member = self.members.get_by_id(member_id).await?;

        if let Some(title) = book_title {
            if title.trim() != book.title.trim() {
                return Err(AppError::IntegrityMismatch(format!(
                    "Book {} is not titled '{}'",
                    book_id, title
                )));
            }
        }

        if !member_email.trim().eq_ignore_ascii_case(member.email.trim()) {
            return Err(AppError::IntegrityMismatch(format!(
                "Member {} does not have email {}",
                member_id, member_email
            )));
        }

        if let Some(name) = member_name {
            if name.trim() != member.name.trim() {
                return Err(AppError::IntegrityMismatch(format!(
                    "Member {} is not named '{}'",
                    member_id, name
                )));
            }
        }

        Ok((book, member))
    }

    pub async fn get(&self, principal: &Principal, id: i32) -> AppResult<BorrowingRecord> {
        self.accessible(principal, id).await
    }

    pub async fn list(&self, page: &PageQuery) -> AppResult<Page<BorrowingRecord>> {
        let (records, total) = self.repository.borrowings.list(page).await?;
        Ok(Page::new(records, total, page))
    }

    /// Create a Requested record
    pub async fn request(
        &self,
        principal: &Principal,
        request: CreateBorrowing,
    ) -> AppResult<BorrowingRecord> {
        if !principal.is_staff() && !principal.is(&request.member_email) {
            return Err(AppError::Authorization(
                "Members may only borrow for themselves".to_string(),
            ));
        }

        let (book, member) = self
            .resolve(
                request.book_id,
                request.book_title.as_deref(),
                request.member_id,
                &request.member_email,
                request.member_name.as_deref(),
            )
            .await?;

        let now = Utc::now();
        let borrow_date = request.borrow_date.unwrap_or(now);
        if borrow_date > now {
            return Err(AppError::Validation(
                "Borrow date cannot be in the future".to_string(),
            ));
        }

        let record = self
            .repository
            .borrowings
            .insert(&NewBorrowing {
                book_id: book.id,
                member_id: member.id,
                borrow_date,
            })
            .await?;

        tracing::info!(
            borrowing_id = record.id,
            book_id = book.id,
            member_id = member.id,
            "borrowing requested"
        );
        Ok(record)
    }

    /// Set the approval flag; always written, whatever the current state
    pub async fn approve(&self, principal: &Principal, id: i32) -> AppResult<BorrowingRecord> {
        principal.require_staff()?;
        let current = self.accessible(principal, id).await?;

        let approved = BorrowingRecord {
            approved: true,
            ..current
        };
        let saved = self.persist(approved).await?;

        tracing::info!(borrowing_id = id, approved_by = %principal.email, "borrowing approved");
        Ok(saved)
    }

    /// Replace the editable fields of a record.
    ///
    /// Staff may change the book, both dates and the approval flag. The
    /// owning member may change only the dates, and only until the record is
    /// returned. Nobody can move a record to another member.
    pub async fn update(
        &self,
        principal: &Principal,
        id: i32,
        request: UpdateBorrowing,
    ) -> AppResult<BorrowingRecord> {
        let current = self.accessible(principal, id).await?;

        if request.member_id != current.member_id {
            return Err(AppError::InvalidState(
                "The member of a borrowing cannot change".to_string(),
            ));
        }

        if !principal.is_staff() {
            if current.is_returned() {
                return Err(AppError::InvalidState(
                    "Returned borrowings cannot be changed".to_string(),
                ));
            }
            if request.book_id != current.book_id || request.approved != current.approved {
                return Err(AppError::Authorization(
                    "Members may only change borrowing dates".to_string(),
                ));
            }
        }

        self.resolve(
            request.book_id,
            request.book_title.as_deref(),
            request.member_id,
            &request.member_email,
            request.member_name.as_deref(),
        )
        .await?;

        let now = Utc::now();
        if request.borrow_date > now {
            return Err(AppError::Validation(
                "Borrow date cannot be in the future".to_string(),
            ));
        }
        if let Some(returned_at) = request.return_date {
            check_return_date(request.borrow_date, returned_at, now)?;
        }

        let updated = BorrowingRecord {
            id: current.id,
            book_id: request.book_id,
            member_id: current.member_id,
            borrow_date: request.borrow_date,
            return_date: request.return_date,
            approved: request.approved,
        };

        if updated == current {
            tracing::debug!(borrowing_id = id, "borrowing unchanged, skipping write");
            return Ok(updated);
        }

        self.persist(updated).await
    }

    /// Close a record; the return date defaults to now
    pub async fn return_book(
        &self,
        principal: &Principal,
        id: i32,
        returned_at: Option<DateTime<Utc>>,
    ) -> AppResult<BorrowingRecord> {
        principal.require_staff()?;
        let current = self.accessible(principal, id).await?;

        if current.is_returned() {
            return Err(AppError::InvalidState(format!(
                "Borrowing {} has already been returned",
                id
            )));
        }

        let now = Utc::now();
        let returned_at = returned_at.unwrap_or(now);
        check_return_date(current.borrow_date, returned_at, now)?;

        let returned = BorrowingRecord {
            return_date: Some(returned_at),
            ..current
        };
        let saved = self.persist(returned).await?;

        tracing::info!(borrowing_id = id, "book returned");
        Ok(saved)
    }

    pub async fn delete(&self, principal: &Principal, id: i32) -> AppResult<()> {
        let record = self.accessible(principal, id).await?;

        self.repository.borrowings.delete(id).await?;
        self.caches.borrowings.evict(&record.cache_keys()).await?;

        tracing::info!(borrowing_id = id, deleted_by = %principal.email, "borrowing deleted");
        Ok(())
    }

    async fn persist(&self, record: BorrowingRecord) -> AppResult<BorrowingRecord> {
        let saved = self.repository.borrowings.update(&record).await?;
        self.caches
            .borrowings
            .refresh(&saved.cache_keys(), saved.clone())
            .await?;
        Ok(saved)
    }
}

fn check_return_date(
    borrowed_at: DateTime<Utc>,
    returned_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if returned_at < borrowed_at {
        return Err(AppError::Validation(
            "Return date cannot precede the borrow date".to_string(),
        ));
    }
    if returned_at > now {
        return Err(AppError::Validation(
            "Return date cannot be in the future".to_string(),
        ));
    }
    Ok(())
}
