//! Borrowing records repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult, EntityKind},
    models::{borrowing::NewBorrowing, BorrowingRecord, PageQuery},
};

use super::BorrowingStore;

#[derive(Clone)]
pub struct BorrowingsRepository {
    pool: Pool<Postgres>,
}

impl BorrowingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowingStore for BorrowingsRepository {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<BorrowingRecord>> {
        let record = sqlx::query_as::<_, BorrowingRecord>(
            "SELECT * FROM borrowing_records WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// List records, most recent borrow first
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<BorrowingRecord>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM borrowing_records")
            .fetch_one(&self.pool)
            .await?;

        let records = sqlx::query_as::<_, BorrowingRecord>(
            "SELECT * FROM borrowing_records ORDER BY borrow_date DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((records, total))
    }

    async fn list_by_member(&self, member_id: i32, active_only: bool) -> AppResult<Vec<BorrowingRecord>> {
        let query = if active_only {
            "SELECT * FROM borrowing_records WHERE member_id = $1 AND return_date IS NULL ORDER BY borrow_date"
        } else {
            "SELECT * FROM borrowing_records WHERE member_id = $1 ORDER BY borrow_date"
        };

        let records = sqlx::query_as::<_, BorrowingRecord>(query)
            .bind(member_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn count_active_by_member(&self, member_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrowing_records WHERE member_id = $1 AND return_date IS NULL",
        )
        .bind(member_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// New records always start unapproved
    async fn insert(&self, record: &NewBorrowing) -> AppResult<BorrowingRecord> {
        let row = sqlx::query_as::<_, BorrowingRecord>(
            r#"
            INSERT INTO borrowing_records (book_id, member_id, borrow_date, return_date, approved)
            VALUES ($1, $2, $3, NULL, FALSE)
            RETURNING *
            "#,
        )
        .bind(record.book_id)
        .bind(record.member_id)
        .bind(record.borrow_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// The owning member column is never rewritten
    async fn update(&self, record: &BorrowingRecord) -> AppResult<BorrowingRecord> {
        sqlx::query_as::<_, BorrowingRecord>(
            r#"
            UPDATE borrowing_records SET
                book_id = $1, borrow_date = $2, return_date = $3, approved = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(record.book_id)
        .bind(record.borrow_date)
        .bind(record.return_date)
        .bind(record.approved)
        .bind(record.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Borrowing, record.id))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM borrowing_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
