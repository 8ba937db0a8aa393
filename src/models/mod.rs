//! Data models for Athenaeum

pub mod author;
pub mod book;
pub mod borrowing;
pub mod member;
pub mod profile;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use author::Author;
pub use book::Book;
pub use borrowing::{BorrowingRecord, BorrowingState};
pub use member::{Member, Role};
pub use profile::MemberProfile;

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// Pagination query parameters shared by every list endpoint
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    /// 1-based page number
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Rows to skip; saturates so an absurd page number reads an empty page
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }
}

/// One page of results plus the total row count
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, query: &PageQuery) -> Self {
        Self {
            items,
            total,
            page: query.page(),
            per_page: query.per_page(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_and_bounds() {
        let query = PageQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 20);
        assert_eq!(query.offset(), 0);

        let query = PageQuery::new(0, 1000);
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 100);

        let query = PageQuery::new(3, 10);
        assert_eq!(query.offset(), 20);
    }

    #[test]
    fn test_offset_saturates_for_huge_pages() {
        let query = PageQuery::new(i64::MAX, 100);
        assert_eq!(query.page(), i64::MAX);
        assert_eq!(query.offset(), i64::MAX);
    }
}
